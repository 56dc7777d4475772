//! Configuration document and server profiles.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::{Credentials, Scheme, ServerEndpoint};

use crate::defaults::{
    default_log_level, default_poll_interval_secs, default_port, default_request_timeout_secs,
    default_rpc_path,
};
use crate::error::{ConfigError, ConfigResult};

/// Log output format requested by the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}

impl LogFormatSetting {
    /// Name understood by the telemetry crate.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// One saved daemon connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProfile {
    /// Unique profile name.
    pub name: String,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL scheme.
    #[serde(default)]
    pub scheme: Scheme,
    /// RPC path on the host.
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
    /// Basic-auth user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for ServerProfile {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ServerProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("rpc_path", &self.rpc_path)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServerProfile {
    /// Profile for `host` with every other field defaulted.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: default_port(),
            scheme: Scheme::default(),
            rpc_path: default_rpc_path(),
            username: None,
            password: None,
        }
    }

    /// Endpoint handed to the sync engine. A user name without a password
    /// authenticates with an empty password.
    #[must_use]
    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            scheme: self.scheme,
            rpc_path: self.rpc_path.clone(),
            credentials: self.username.as_ref().map(|username| Credentials {
                username: username.clone(),
                password: self.password.clone().unwrap_or_default(),
            }),
        }
    }
}

/// The whole client configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Saved daemon connections.
    #[serde(default)]
    pub servers: Vec<ServerProfile>,
    /// Name of the selected profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_server: Option<String>,
    /// Seconds between polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// HTTP timeout per daemon call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Log filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format; inferred from the build when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormatSetting>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            active_server: None,
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
            log_format: None,
        }
    }
}

impl ClientConfig {
    /// Look up a profile by name.
    #[must_use]
    pub fn server(&self, name: &str) -> Option<&ServerProfile> {
        self.servers.iter().find(|server| server.name == name)
    }

    /// Resolve `requested`, or the active profile when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownServer`] when the name matches no profile
    /// and [`ConfigError::NoServerSelected`] when nothing is requested or active.
    pub fn resolve_server(&self, requested: Option<&str>) -> ConfigResult<&ServerProfile> {
        let name = requested
            .or(self.active_server.as_deref())
            .ok_or(ConfigError::NoServerSelected)?;
        self.server(name).ok_or_else(|| ConfigError::UnknownServer {
            name: name.to_string(),
        })
    }

    /// Insert `profile`, replacing any profile with the same name in place.
    pub fn upsert_server(&mut self, profile: ServerProfile) {
        match self
            .servers
            .iter_mut()
            .find(|existing| existing.name == profile.name)
        {
            Some(existing) => *existing = profile,
            None => self.servers.push(profile),
        }
    }

    /// Drop the profile named `name`, clearing the selection if it was active.
    /// Returns whether a profile was removed.
    pub fn remove_server(&mut self, name: &str) -> bool {
        let before = self.servers.len();
        self.servers.retain(|server| server.name != name);
        if self.active_server.as_deref() == Some(name) {
            self.active_server = None;
        }
        self.servers.len() != before
    }

    /// Poll interval, clamped to at least one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// HTTP timeout per daemon call.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_take_defaults() {
        let config: ClientConfig = serde_json::from_value(json!({
            "servers": [{ "name": "home", "host": "nas.local" }]
        }))
        .expect("config");
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.log_level, "info");
        let server = &config.servers[0];
        assert_eq!(server.port, 9091);
        assert_eq!(server.rpc_path, "/transmission/rpc");
        assert_eq!(server.scheme, Scheme::Http);
    }

    #[test]
    fn short_poll_intervals_are_clamped() {
        let config = ClientConfig {
            poll_interval_secs: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn endpoint_carries_credentials_only_with_a_username() {
        let mut profile = ServerProfile::new("home", "nas.local");
        assert!(profile.endpoint().credentials.is_none());
        profile.username = Some("admin".into());
        let credentials = profile.endpoint().credentials.expect("credentials");
        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.password, "");
    }

    #[test]
    fn debug_output_redacts_the_password() {
        let mut profile = ServerProfile::new("home", "nas.local");
        profile.password = Some("hunter2".into());
        assert!(!format!("{profile:?}").contains("hunter2"));
    }

    #[test]
    fn resolve_prefers_the_requested_name() {
        let mut config = ClientConfig::default();
        config.upsert_server(ServerProfile::new("home", "nas.local"));
        config.upsert_server(ServerProfile::new("seedbox", "seed.example"));
        config.active_server = Some("home".into());

        assert_eq!(config.resolve_server(None).map(|s| s.name.as_str()).ok(), Some("home"));
        assert_eq!(
            config.resolve_server(Some("seedbox")).map(|s| s.name.as_str()).ok(),
            Some("seedbox")
        );
        assert!(matches!(
            config.resolve_server(Some("office")),
            Err(ConfigError::UnknownServer { .. })
        ));
        config.active_server = None;
        assert!(matches!(
            config.resolve_server(None),
            Err(ConfigError::NoServerSelected)
        ));
    }
}
