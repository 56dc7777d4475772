//! Persistence of the configuration document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ClientConfig, ServerProfile};
use crate::validate::validate_profile;

/// Abstraction over where server profiles and client settings are kept.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Read and validate the document; a missing document yields defaults.
    async fn load(&self) -> ConfigResult<ClientConfig>;

    /// Validate and persist the whole document.
    async fn save(&self, config: &ClientConfig) -> ConfigResult<()>;

    /// Add or replace one profile and persist.
    async fn upsert(&self, profile: ServerProfile) -> ConfigResult<ClientConfig> {
        validate_profile(&profile)?;
        let mut config = self.load().await?;
        config.upsert_server(profile);
        self.save(&config).await?;
        Ok(config)
    }

    /// Remove one profile and persist; removing the active profile clears the
    /// selection.
    async fn remove(&self, name: &str) -> ConfigResult<ClientConfig> {
        let mut config = self.load().await?;
        if !config.remove_server(name) {
            return Err(ConfigError::UnknownServer {
                name: name.to_string(),
            });
        }
        self.save(&config).await?;
        Ok(config)
    }

    /// Select a profile (or none) and persist.
    async fn set_active(&self, name: Option<&str>) -> ConfigResult<ClientConfig> {
        let mut config = self.load().await?;
        if let Some(name) = name
            && config.server(name).is_none()
        {
            return Err(ConfigError::UnknownServer {
                name: name.to_string(),
            });
        }
        config.active_server = name.map(str::to_string);
        self.save(&config).await?;
        Ok(config)
    }
}

/// Document stored as pretty-printed JSON in one file.
#[derive(Debug, Clone)]
pub struct JsonServerStore {
    path: PathBuf,
}

impl JsonServerStore {
    /// Store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, operation: &'static str, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            operation,
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ServerStore for JsonServerStore {
    async fn load(&self) -> ConfigResult<ClientConfig> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "config file missing; using defaults");
                return Ok(ClientConfig::default());
            }
            Err(err) => return Err(self.io_error("config.read", err)),
        };
        let config: ClientConfig =
            serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    async fn save(&self, config: &ClientConfig) -> ConfigResult<()> {
        config.validate()?;
        let mut payload = serde_json::to_vec_pretty(config)
            .map_err(|source| ConfigError::Serialize { source })?;
        payload.push(b'\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| self.io_error("config.create_dir", err))?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, &payload)
            .await
            .map_err(|err| self.io_error("config.write", err))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|err| self.io_error("config.rename", err))?;
        info!(
            path = %self.path.display(),
            servers = config.servers.len(),
            "configuration saved"
        );
        Ok(())
    }
}
