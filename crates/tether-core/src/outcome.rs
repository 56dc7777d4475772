//! Four-valued outcome reported for every daemon call.

use serde::{Deserialize, Serialize};

/// Outcome of a single daemon call once transport details are stripped away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionResponse {
    /// The daemon accepted the call.
    Success,
    /// The daemon rejected the credentials.
    Unauthorized,
    /// The endpoint or request was malformed, or the daemon rejected the arguments.
    ConfigError,
    /// Any other failure; possibly transient.
    Failed,
}

impl TransmissionResponse {
    /// Whether the call succeeded.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the outcome needs user attention (re-authentication or a
    /// settings review) rather than a retry.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Unauthorized | Self::ConfigError)
    }

    /// Stable label used in logs and notifications.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unauthorized => "unauthorized",
            Self::ConfigError => "config_error",
            Self::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_outcomes_are_auth_and_config() {
        assert!(TransmissionResponse::Unauthorized.is_terminal());
        assert!(TransmissionResponse::ConfigError.is_terminal());
        assert!(!TransmissionResponse::Failed.is_terminal());
        assert!(!TransmissionResponse::Success.is_terminal());
        assert!(TransmissionResponse::Success.is_success());
    }
}
