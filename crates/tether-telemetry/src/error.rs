//! Error types for telemetry operations.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn subscriber_install_error_keeps_its_source() {
        let first = tracing_subscriber::registry().try_init();
        let second = tracing_subscriber::registry().try_init();
        let Some(source) = first.err().or(second.err()) else {
            panic!("second global subscriber install should fail");
        };
        let err = TelemetryError::SubscriberInstall { source };
        assert_eq!(err.to_string(), "failed to install tracing subscriber");
        assert!(err.source().is_some());
    }
}
