//! The daemon call surface consumed by the sync engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tether_core::{
    AddTorrent, AddedTorrent, QueueMove, ServerEndpoint, SessionSettings,
    SessionSettingsChangeset, SessionStats, Torrent, TorrentAction, TorrentChangeset,
    TorrentFiles, TorrentId,
};
use tracing::{debug, warn};

use crate::client::HttpTransmissionClient;
use crate::error::{RpcError, RpcResult};
use crate::wire::{
    self, IdsArgs, NoArguments, RenamePathArgs, SessionSetArgs, TorrentAddArgs,
    TorrentAddResponse, TorrentGetArgs, TorrentGetResponse, TorrentRemoveArgs, TorrentSetArgs,
    WireSessionSettings, WireSessionStats, WireTorrent, WireTorrentFiles,
};

/// Calls the sync engine issues against one daemon.
#[async_trait]
pub trait TransmissionRpc: Send + Sync {
    /// Fetch every torrent with the list fields. Entries that fail to decode
    /// are logged and left out.
    async fn torrent_list(&self) -> RpcResult<Vec<Torrent>>;

    /// Fetch aggregate transfer statistics.
    async fn session_stats(&self) -> RpcResult<SessionStats>;

    /// Fetch daemon settings.
    async fn session_settings(&self) -> RpcResult<SessionSettings>;

    /// Write the changed settings fields.
    async fn set_session(&self, changes: &SessionSettingsChangeset) -> RpcResult<()>;

    /// Fetch one torrent's file list and per-file stats.
    async fn torrent_files(&self, id: TorrentId) -> RpcResult<TorrentFiles>;

    /// Add one torrent from a link or metainfo payload.
    async fn add_torrent(&self, request: &AddTorrent) -> RpcResult<AddedTorrent>;

    /// Remove torrents, optionally deleting their data.
    async fn remove_torrents(&self, ids: &[TorrentId], delete_local_data: bool) -> RpcResult<()>;

    /// Apply a changeset to the listed torrents.
    async fn set_torrents(&self, ids: &[TorrentId], changes: &TorrentChangeset) -> RpcResult<()>;

    /// Rename a torrent's root path.
    async fn rename_path(&self, id: TorrentId, path: &str, name: &str) -> RpcResult<()>;

    /// Move torrents within the daemon queue.
    async fn queue_move(&self, ids: &[TorrentId], direction: QueueMove) -> RpcResult<()>;

    /// Start, stop, verify, or reannounce torrents.
    async fn torrent_action(&self, ids: &[TorrentId], action: TorrentAction) -> RpcResult<()>;
}

const fn queue_method(direction: QueueMove) -> &'static str {
    match direction {
        QueueMove::Top => "queue-move-top",
        QueueMove::Up => "queue-move-up",
        QueueMove::Down => "queue-move-down",
        QueueMove::Bottom => "queue-move-bottom",
    }
}

const fn action_method(action: TorrentAction) -> &'static str {
    match action {
        TorrentAction::Start => "torrent-start",
        TorrentAction::StartNow => "torrent-start-now",
        TorrentAction::Stop => "torrent-stop",
        TorrentAction::Verify => "torrent-verify",
        TorrentAction::Reannounce => "torrent-reannounce",
    }
}

#[async_trait]
impl TransmissionRpc for HttpTransmissionClient {
    async fn torrent_list(&self) -> RpcResult<Vec<Torrent>> {
        let args = TorrentGetArgs {
            ids: None,
            fields: wire::TORRENT_LIST_FIELDS,
        };
        let response: TorrentGetResponse<WireTorrent> =
            self.call_as(wire::TORRENT_GET, &args).await?;
        Ok(response
            .torrents
            .into_iter()
            .filter_map(|torrent| match torrent.into_torrent() {
                Ok(torrent) => Some(torrent),
                Err(err) => {
                    warn!(error = %err, "skipping undecodable torrent");
                    None
                }
            })
            .collect())
    }

    async fn session_stats(&self) -> RpcResult<SessionStats> {
        let stats: WireSessionStats = self.call_as(wire::SESSION_STATS, &NoArguments {}).await?;
        Ok(stats.into())
    }

    async fn session_settings(&self) -> RpcResult<SessionSettings> {
        let settings: WireSessionSettings =
            self.call_as(wire::SESSION_GET, &NoArguments {}).await?;
        Ok(settings.into())
    }

    async fn set_session(&self, changes: &SessionSettingsChangeset) -> RpcResult<()> {
        self.call(wire::SESSION_SET, &SessionSetArgs::from(changes))
            .await
            .map(drop)
    }

    async fn torrent_files(&self, id: TorrentId) -> RpcResult<TorrentFiles> {
        let ids = [id];
        let args = TorrentGetArgs {
            ids: Some(&ids),
            fields: wire::TORRENT_FILE_FIELDS,
        };
        let response: TorrentGetResponse<WireTorrentFiles> =
            self.call_as(wire::TORRENT_GET, &args).await?;
        response
            .torrents
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| RpcError::Malformed {
                method: wire::TORRENT_GET,
                reason: format!("torrent {id} missing from response"),
            })?
            .into_files()
    }

    async fn add_torrent(&self, request: &AddTorrent) -> RpcResult<AddedTorrent> {
        let response: TorrentAddResponse = self
            .call_as(wire::TORRENT_ADD, &TorrentAddArgs::from(request))
            .await?;
        response.into_added()
    }

    async fn remove_torrents(&self, ids: &[TorrentId], delete_local_data: bool) -> RpcResult<()> {
        let args = TorrentRemoveArgs {
            ids,
            delete_local_data,
        };
        self.call(wire::TORRENT_REMOVE, &args).await.map(drop)
    }

    async fn set_torrents(&self, ids: &[TorrentId], changes: &TorrentChangeset) -> RpcResult<()> {
        self.call(wire::TORRENT_SET, &TorrentSetArgs::new(ids, changes))
            .await
            .map(drop)
    }

    async fn rename_path(&self, id: TorrentId, path: &str, name: &str) -> RpcResult<()> {
        let args = RenamePathArgs {
            ids: [id],
            path,
            name,
        };
        self.call(wire::TORRENT_RENAME_PATH, &args).await.map(drop)
    }

    async fn queue_move(&self, ids: &[TorrentId], direction: QueueMove) -> RpcResult<()> {
        self.call(queue_method(direction), &IdsArgs { ids })
            .await
            .map(drop)
    }

    async fn torrent_action(&self, ids: &[TorrentId], action: TorrentAction) -> RpcResult<()> {
        self.call(action_method(action), &IdsArgs { ids })
            .await
            .map(drop)
    }
}

/// Builds a daemon client for a server profile.
pub trait RpcConnector: Send + Sync {
    /// Bind a client to `server`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidEndpoint`] when the profile is unusable.
    fn connect(&self, server: &ServerEndpoint) -> RpcResult<Arc<dyn TransmissionRpc>>;
}

/// Connector sharing one pooled HTTP client across servers.
#[derive(Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    /// Build a connector whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ClientBuild`] when the TLS backend cannot start.
    pub fn new(timeout: Duration) -> RpcResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| RpcError::ClientBuild { source })?;
        Ok(Self { client })
    }
}

impl RpcConnector for HttpConnector {
    fn connect(&self, server: &ServerEndpoint) -> RpcResult<Arc<dyn TransmissionRpc>> {
        let client = HttpTransmissionClient::new(self.client.clone(), server)?;
        debug!(server = %server.name, url = %client.url(), "bound daemon client");
        Ok(Arc::new(client))
    }
}
