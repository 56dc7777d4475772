//! Fallback values for the client configuration document.

use std::env;
use std::path::PathBuf;

/// File name of the configuration document.
pub const CONFIG_FILE_NAME: &str = "tether.json";
/// Transmission's default RPC port.
pub const DEFAULT_PORT: u16 = 9091;
/// Default RPC path on the daemon host.
pub const DEFAULT_RPC_PATH: &str = "/transmission/rpc";
/// Poll interval used when the document does not set one.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// HTTP timeout used when the document does not set one.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Log filter used when the document does not set one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `$XDG_CONFIG_HOME/tether/tether.json`, falling back to `~/.config`.
///
/// Returns `None` when neither variable is set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    let base = env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("tether").join(CONFIG_FILE_NAME))
}

pub(crate) const fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_rpc_path() -> String {
    DEFAULT_RPC_PATH.to_string()
}

pub(crate) const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

pub(crate) const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

pub(crate) fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
