//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: String,
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// No server profile carries the requested name.
    #[error("unknown server profile")]
    UnknownServer {
        /// Requested profile name.
        name: String,
    },
    /// No server is selected and none was requested.
    #[error("no server selected")]
    NoServerSelected,
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("configuration directory could not be determined")]
    NoConfigDir,
    /// The configuration document is not valid JSON for the expected shape.
    #[error("failed to parse configuration document")]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Source parse error.
        source: serde_json::Error,
    },
    /// Serialising the configuration document failed.
    #[error("failed to serialize configuration document")]
    Serialize {
        /// Source serde error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: impl Into<String>,
        field: &str,
        value: Option<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section: section.into(),
            field: field.to_string(),
            value,
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
