//! Validation of the configuration document.

use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ClientConfig, ServerProfile};

impl ClientConfig {
    /// Check profile names, hosts, ports, RPC paths, and the active selection.
    ///
    /// Poll intervals are not rejected; they are clamped when read.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] describing the first offending
    /// field, or [`ConfigError::UnknownServer`] when `active_server` names no
    /// profile.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut names = HashSet::with_capacity(self.servers.len());
        for server in &self.servers {
            validate_profile(server)?;
            if !names.insert(server.name.as_str()) {
                return Err(ConfigError::invalid(
                    "servers",
                    "name",
                    Some(server.name.clone()),
                    "duplicate",
                ));
            }
        }
        if let Some(active) = &self.active_server
            && !names.contains(active.as_str())
        {
            return Err(ConfigError::UnknownServer {
                name: active.clone(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "client",
                "request_timeout_secs",
                Some("0".to_string()),
                "must_be_positive",
            ));
        }
        Ok(())
    }
}

/// Check one profile in isolation.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for an empty name or host, port 0,
/// or an RPC path that does not start with `/`.
pub fn validate_profile(server: &ServerProfile) -> ConfigResult<()> {
    let section = if server.name.is_empty() {
        "servers".to_string()
    } else {
        format!("servers.{}", server.name)
    };
    if server.name.trim().is_empty() {
        return Err(ConfigError::invalid(section, "name", None, "empty"));
    }
    if server.host.trim().is_empty() {
        return Err(ConfigError::invalid(section, "host", None, "empty"));
    }
    if server.port == 0 {
        return Err(ConfigError::invalid(
            section,
            "port",
            Some("0".to_string()),
            "out_of_range",
        ));
    }
    if !server.rpc_path.starts_with('/') {
        return Err(ConfigError::invalid(
            section,
            "rpc_path",
            Some(server.rpc_path.clone()),
            "must_be_absolute",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(servers: Vec<ServerProfile>) -> ClientConfig {
        ClientConfig {
            servers,
            ..ClientConfig::default()
        }
    }

    fn reason(result: ConfigResult<()>) -> Option<(String, &'static str)> {
        match result {
            Err(ConfigError::InvalidField { field, reason, .. }) => Some((field, reason)),
            _ => None,
        }
    }

    #[test]
    fn valid_document_passes() {
        let mut config = config_with(vec![
            ServerProfile::new("home", "nas.local"),
            ServerProfile::new("seedbox", "seed.example"),
        ]);
        config.active_server = Some("seedbox".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let config = config_with(vec![
            ServerProfile::new("home", "nas.local"),
            ServerProfile::new("home", "other.local"),
        ]);
        assert_eq!(
            reason(config.validate()),
            Some(("name".to_string(), "duplicate"))
        );
    }

    #[test]
    fn profile_fields_are_checked() {
        let mut empty_host = ServerProfile::new("home", " ");
        assert_eq!(
            reason(validate_profile(&empty_host)),
            Some(("host".to_string(), "empty"))
        );
        empty_host.host = "nas.local".into();
        empty_host.port = 0;
        assert_eq!(
            reason(validate_profile(&empty_host)),
            Some(("port".to_string(), "out_of_range"))
        );
        empty_host.port = 9091;
        empty_host.rpc_path = "transmission/rpc".into();
        assert_eq!(
            reason(validate_profile(&empty_host)),
            Some(("rpc_path".to_string(), "must_be_absolute"))
        );
        assert_eq!(
            reason(validate_profile(&ServerProfile::new("", "nas.local"))),
            Some(("name".to_string(), "empty"))
        );
    }

    #[test]
    fn active_server_must_exist() {
        let mut config = config_with(vec![ServerProfile::new("home", "nas.local")]);
        config.active_server = Some("office".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownServer { name }) if name == "office"
        ));
    }

    #[test]
    fn zero_poll_interval_is_accepted() {
        let config = ClientConfig {
            poll_interval_secs: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
