//! Error types for the sync worker.
//!
//! Daemon outcomes are reported as [`TransmissionResponse`](tether_core::TransmissionResponse)
//! values, never as errors; `SyncError` covers what is rejected locally.

use tether_core::CoreError;
use tether_rpc::RpcError;
use thiserror::Error;

/// Failures raised before a daemon call is dispatched.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The request was invalid against the cached state.
    #[error("request rejected by local validation")]
    Core(#[from] CoreError),
    /// No server is selected.
    #[error("no active server")]
    NoActiveServer,
    /// Settings must be fetched before they can be diffed.
    #[error("session settings not loaded")]
    SettingsNotLoaded,
    /// The selected server profile cannot be turned into a client.
    #[error("failed to connect to server")]
    Connect {
        /// Profile name.
        server: String,
        /// Underlying client error.
        #[source]
        source: RpcError,
    },
    /// The worker task has shut down.
    #[error("sync worker stopped")]
    WorkerStopped,
}

/// Convenience alias for sync results.
pub type SyncResult<T> = Result<T, SyncError>;
