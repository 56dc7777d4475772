//! Error types for daemon calls.

use tether_core::TransmissionResponse;
use thiserror::Error;

/// Transport and protocol failures raised by the RPC client.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The daemon rejected the credentials.
    #[error("daemon rejected credentials")]
    Unauthorized {
        /// HTTP status returned (401 or 403).
        status: u16,
    },
    /// The server profile cannot form a valid RPC URL.
    #[error("invalid daemon endpoint")]
    InvalidEndpoint {
        /// Human-readable reason.
        reason: String,
    },
    /// The daemon answered with a non-success `result` string.
    #[error("daemon rejected request")]
    Rejected {
        /// RPC method name.
        method: &'static str,
        /// `result` string reported by the daemon.
        result: String,
    },
    /// The daemon answered with an unexpected HTTP status.
    #[error("unexpected HTTP status")]
    Status {
        /// RPC method name.
        method: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// The session-token exchange did not converge.
    #[error("session token handshake failed")]
    SessionHandshake {
        /// RPC method name.
        method: &'static str,
    },
    /// The HTTP request could not be completed.
    #[error("request transport failed")]
    Transport {
        /// RPC method name.
        method: &'static str,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body was not the expected JSON.
    #[error("failed to decode response")]
    Decode {
        /// RPC method name.
        method: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// The response decoded but violated a protocol invariant.
    #[error("malformed response")]
    Malformed {
        /// RPC method name.
        method: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    ClientBuild {
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
}

impl RpcError {
    /// Collapse the failure into the four-valued outcome seen by callers.
    #[must_use]
    pub const fn response(&self) -> TransmissionResponse {
        match self {
            Self::Unauthorized { .. } => TransmissionResponse::Unauthorized,
            Self::InvalidEndpoint { .. } | Self::Rejected { .. } => {
                TransmissionResponse::ConfigError
            }
            Self::Status { status, .. } => match *status {
                400 | 404 | 405 | 415 => TransmissionResponse::ConfigError,
                _ => TransmissionResponse::Failed,
            },
            Self::SessionHandshake { .. }
            | Self::Transport { .. }
            | Self::Decode { .. }
            | Self::Malformed { .. }
            | Self::ClientBuild { .. } => TransmissionResponse::Failed,
        }
    }

    /// Human-readable detail including the daemon's own message where present.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Unauthorized { status } => format!("daemon returned HTTP {status}"),
            Self::InvalidEndpoint { reason } => reason.clone(),
            Self::Rejected { method, result } => format!("{method}: {result}"),
            Self::Status { method, status } => format!("{method}: HTTP {status}"),
            Self::SessionHandshake { method } => {
                format!("{method}: daemon kept rejecting the session token")
            }
            Self::Transport { method, source } => format!("{method}: {source}"),
            Self::Decode { method, source } => format!("{method}: {source}"),
            Self::Malformed { method, reason } => format!("{method}: {reason}"),
            Self::ClientBuild { source } => source.to_string(),
        }
    }
}

/// Convenience alias for RPC results.
pub type RpcResult<T> = Result<T, RpcError>;
