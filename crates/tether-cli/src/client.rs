//! Shared client utilities, error types, and session wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tether_config::{ClientConfig, ConfigError};
use tether_core::{CoreError, TorrentId, TransmissionResponse};
use tether_events::EventBus;
use tether_rpc::HttpConnector;
use tether_sync::{SessionHandle, SyncError};

use crate::cli::{OutputFormat, SessionOptions};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidField {
                section,
                field,
                value,
                reason,
            } => Self::validation(match value {
                Some(value) => format!("{section}.{field} = '{value}' is invalid ({reason})"),
                None => format!("{section}.{field} is invalid ({reason})"),
            }),
            ConfigError::UnknownServer { name } => {
                Self::validation(format!("no server profile named '{name}'"))
            }
            ConfigError::NoServerSelected => Self::validation(
                "no server selected (pass --server or run `tether servers use <name>`)",
            ),
            ConfigError::NoConfigDir => Self::validation(
                "cannot locate the configuration file (pass --config or set TETHER_CONFIG)",
            ),
            ConfigError::Parse { ref path, .. } | ConfigError::Io { ref path, .. } => {
                let context = format!("configuration file {}", path.display());
                Self::failure(anyhow::Error::new(err).context(context))
            }
            ConfigError::Serialize { .. } => Self::failure(err),
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Core(core) => Self::validation(describe_core(&core)),
            SyncError::SettingsNotLoaded => {
                Self::validation("daemon settings have not been loaded")
            }
            SyncError::NoActiveServer => Self::failure(anyhow!("no active server")),
            SyncError::Connect { .. } | SyncError::WorkerStopped => Self::failure(err),
        }
    }
}

fn describe_core(err: &CoreError) -> String {
    match err {
        CoreError::UnknownTorrent { torrent_id } => format!("no torrent with id {torrent_id}"),
        CoreError::FilesNotLoaded { torrent_id } => {
            format!("files of torrent {torrent_id} are not loaded")
        }
        CoreError::FileIndexOutOfRange {
            torrent_id,
            index,
            len,
        } => format!("torrent {torrent_id} has {len} files; index {index} is out of range"),
        CoreError::MisalignedFiles { files, stats } => {
            format!("daemon reported {files} files but {stats} file stats")
        }
        CoreError::InvalidName { reason } => format!("invalid torrent name ({reason})"),
        CoreError::EmptySelection => "no torrents or files selected".to_string(),
    }
}

/// Turn a non-success daemon outcome into a CLI error naming `action`.
pub(crate) fn expect_success(action: &str, outcome: TransmissionResponse) -> CliResult<()> {
    match outcome {
        TransmissionResponse::Success => Ok(()),
        TransmissionResponse::Unauthorized => Err(CliError::failure(anyhow!(
            "{action}: daemon rejected the credentials"
        ))),
        TransmissionResponse::ConfigError => Err(CliError::validation(format!(
            "{action}: daemon rejected the request; check the server profile"
        ))),
        TransmissionResponse::Failed => Err(CliError::failure(anyhow!(
            "{action} failed; the daemon may be unreachable"
        ))),
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) handle: SessionHandle,
    pub(crate) output: OutputFormat,
    pub(crate) poll_interval: Duration,
}

impl AppContext {
    /// Spawn a sync session bound to the resolved server profile.
    pub(crate) async fn connect(
        config: &ClientConfig,
        options: &SessionOptions,
    ) -> CliResult<Self> {
        let profile = config.resolve_server(options.server.as_deref())?;
        let timeout = options
            .timeout_secs
            .map_or_else(|| config.request_timeout(), Duration::from_secs);
        if timeout.is_zero() {
            return Err(CliError::validation("--timeout must be at least 1 second"));
        }
        let connector = HttpConnector::new(timeout)
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        let handle = SessionHandle::spawn(Arc::new(connector), EventBus::new());
        handle.switch_server(Some(profile.endpoint())).await?;
        tracing::debug!(server = %profile.name, "session bound to server");

        Ok(Self {
            handle,
            output: options.output,
            poll_interval: options
                .interval_secs
                .map_or_else(|| config.poll_interval(), Duration::from_secs),
        })
    }

    /// Poll once so mutations validate against fresh daemon state.
    pub(crate) async fn refresh(&self) -> CliResult<()> {
        let outcome = self.handle.refresh_now().await?;
        expect_success("refresh", outcome)
    }

    /// Refresh and load the file list of `torrent_id`.
    pub(crate) async fn load_files(&self, torrent_id: TorrentId) -> CliResult<()> {
        self.refresh().await?;
        let outcome = self.handle.fetch_files(torrent_id).await?;
        expect_success("fetch files", outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn exit_codes_separate_validation_from_failure() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
        assert_eq!(CliError::validation("bad").to_string(), "cli error");
    }

    #[test]
    fn config_errors_name_the_offending_input() {
        let err = CliError::from(ConfigError::UnknownServer {
            name: "nas".into(),
        });
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("'nas'"));

        let parse = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        let err = CliError::from(ConfigError::Parse {
            path: PathBuf::from("/tmp/tether.json"),
            source: parse,
        });
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("/tmp/tether.json"));
    }

    #[test]
    fn local_rejections_are_validation_errors() {
        let err = CliError::from(SyncError::Core(CoreError::FileIndexOutOfRange {
            torrent_id: 4,
            index: 9,
            len: 2,
        }));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.display_message(),
            "torrent 4 has 2 files; index 9 is out of range"
        );
        assert_eq!(CliError::from(SyncError::WorkerStopped).exit_code(), 3);
    }

    #[test]
    fn outcomes_map_to_exit_codes() {
        assert!(expect_success("rename", TransmissionResponse::Success).is_ok());
        let config = expect_success("rename", TransmissionResponse::ConfigError)
            .expect_err("config error");
        assert_eq!(config.exit_code(), 2);
        let denied = expect_success("rename", TransmissionResponse::Unauthorized)
            .expect_err("unauthorized");
        assert_eq!(denied.exit_code(), 3);
        assert!(denied.display_message().starts_with("rename:"));
    }
}
