//! Cloneable facade over the sync worker.

use std::sync::Arc;
use std::time::Duration;

use tether_core::{
    AddTorrent, BandwidthLimits, BatchSummary, FilePriority, QueueMove, ServerEndpoint,
    SessionCache, SessionSettings, TorrentAction, TorrentId, TransmissionResponse,
};
use tether_events::EventBus;
use tether_rpc::RpcConnector;
use tokio::sync::{mpsc, oneshot};

use crate::command::SyncCommand;
use crate::error::{SyncError, SyncResult};
use crate::mutation::Mutation;
use crate::worker;

/// Poll interval used until a caller picks one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

const COMMAND_BUFFER: usize = 128;

/// Raise `interval` to [`MIN_POLL_INTERVAL`] when it is shorter.
#[must_use]
pub fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_POLL_INTERVAL)
}

/// Handle to the task that owns the session cache.
///
/// Every method round-trips through the worker, so callers observe the cache
/// only through [`SessionHandle::snapshot`] and events published on the bus.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SyncCommand>,
    events: EventBus,
}

impl SessionHandle {
    /// Spawn the worker on the current runtime. No server is selected yet.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(connector: Arc<dyn RpcConnector>, events: EventBus) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        worker::spawn(connector, events.clone(), DEFAULT_POLL_INTERVAL, rx);
        Self { commands, events }
    }

    /// Bus the worker publishes refresh and failure notifications on.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SyncCommand,
    ) -> SyncResult<T> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(build(respond_to))
            .await
            .map_err(|_| SyncError::WorkerStopped)?;
        response.await.map_err(|_| SyncError::WorkerStopped)
    }

    /// Begin periodic polling, firing the first poll immediately. Returns the
    /// effective interval after clamping.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WorkerStopped`] if the worker has shut down.
    pub async fn start_polling(&self, interval: Duration) -> SyncResult<Duration> {
        self.request(|respond_to| SyncCommand::StartPolling {
            interval,
            respond_to,
        })
        .await
    }

    /// Cancel periodic polling. In-flight calls still complete.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WorkerStopped`] if the worker has shut down.
    pub async fn stop_polling(&self) -> SyncResult<()> {
        self.request(|respond_to| SyncCommand::StopPolling { respond_to })
            .await
    }

    /// Change the poll interval; an active timer restarts with the new period.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WorkerStopped`] if the worker has shut down.
    pub async fn update_interval(&self, interval: Duration) -> SyncResult<Duration> {
        self.request(|respond_to| SyncCommand::UpdateInterval {
            interval,
            respond_to,
        })
        .await
    }

    /// Poll once out of band and wait for both the torrent list and the
    /// session stats to be merged. Returns the torrent-list outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoActiveServer`] when no server is selected.
    pub async fn refresh_now(&self) -> SyncResult<TransmissionResponse> {
        self.request(|respond_to| SyncCommand::RefreshNow { respond_to })
            .await?
    }

    /// Select a different daemon (or none). Everything cached for the previous
    /// one is dropped and its late responses are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connect`] when no client can be built for `server`;
    /// the current selection is left in place.
    pub async fn switch_server(&self, server: Option<ServerEndpoint>) -> SyncResult<()> {
        self.request(|respond_to| SyncCommand::SwitchServer { server, respond_to })
            .await?
    }

    /// Copy of the current cache.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WorkerStopped`] if the worker has shut down.
    pub async fn snapshot(&self) -> SyncResult<SessionCache> {
        self.request(|respond_to| SyncCommand::Snapshot { respond_to })
            .await
    }

    /// Fetch the file list of one torrent into the cache.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Core`] when the torrent is not cached.
    pub async fn fetch_files(&self, torrent_id: TorrentId) -> SyncResult<TransmissionResponse> {
        self.request(|respond_to| SyncCommand::FetchFiles {
            torrent_id,
            respond_to,
        })
        .await?
    }

    /// Fetch daemon settings into the cache.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoActiveServer`] when no server is selected.
    pub async fn fetch_session_settings(&self) -> SyncResult<TransmissionResponse> {
        self.request(|respond_to| SyncCommand::FetchSettings { respond_to })
            .await?
    }

    /// Apply one mutation optimistically and reconcile it with the daemon.
    ///
    /// Daemon-side failures are reported through the returned outcome after
    /// the cache has been reverted; only local validation fails with an error.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Core`] or [`SyncError::SettingsNotLoaded`] when the
    /// mutation is rejected before dispatch.
    pub async fn apply(&self, mutation: Mutation) -> SyncResult<TransmissionResponse> {
        self.request(|respond_to| SyncCommand::Mutate {
            mutation,
            respond_to,
        })
        .await?
    }

    /// Write the settings in `desired` that differ from the cached ones.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn update_session_settings(
        &self,
        desired: SessionSettings,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::UpdateSettings {
            desired: Box::new(desired),
        })
        .await
    }

    /// Mark files wanted or unwanted.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn set_wanted(
        &self,
        torrent_id: TorrentId,
        indices: Vec<usize>,
        wanted: bool,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::SetWanted {
            torrent_id,
            indices,
            wanted,
        })
        .await
    }

    /// Set the download priority of files.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn set_priority(
        &self,
        torrent_id: TorrentId,
        indices: Vec<usize>,
        priority: FilePriority,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::SetPriority {
            torrent_id,
            indices,
            priority,
        })
        .await
    }

    /// Rename a torrent's root path.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn rename(
        &self,
        torrent_id: TorrentId,
        name: impl Into<String>,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::Rename {
            torrent_id,
            name: name.into(),
        })
        .await
    }

    /// Replace the labels of torrents.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn set_labels(
        &self,
        ids: Vec<TorrentId>,
        labels: Vec<String>,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::SetLabels { ids, labels }).await
    }

    /// Remove torrents, optionally with their data.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn remove(
        &self,
        ids: Vec<TorrentId>,
        delete_local_data: bool,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::Remove {
            ids,
            delete_local_data,
        })
        .await
    }

    async fn action(
        &self,
        ids: Vec<TorrentId>,
        action: TorrentAction,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::Action { ids, action }).await
    }

    /// Resume torrents.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn start(&self, ids: Vec<TorrentId>) -> SyncResult<TransmissionResponse> {
        self.action(ids, TorrentAction::Start).await
    }

    /// Pause torrents.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn stop(&self, ids: Vec<TorrentId>) -> SyncResult<TransmissionResponse> {
        self.action(ids, TorrentAction::Stop).await
    }

    /// Resume torrents ahead of the queue.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn start_now(&self, ids: Vec<TorrentId>) -> SyncResult<TransmissionResponse> {
        self.action(ids, TorrentAction::StartNow).await
    }

    /// Re-check downloaded data.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn verify(&self, ids: Vec<TorrentId>) -> SyncResult<TransmissionResponse> {
        self.action(ids, TorrentAction::Verify).await
    }

    /// Ask trackers for more peers.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn reannounce(&self, ids: Vec<TorrentId>) -> SyncResult<TransmissionResponse> {
        self.action(ids, TorrentAction::Reannounce).await
    }

    /// Move torrents within the queue.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn queue_move(
        &self,
        ids: Vec<TorrentId>,
        direction: QueueMove,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::QueueMove { ids, direction }).await
    }

    /// Change per-torrent bandwidth limits.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn set_bandwidth(
        &self,
        ids: Vec<TorrentId>,
        limits: BandwidthLimits,
    ) -> SyncResult<TransmissionResponse> {
        self.apply(Mutation::SetBandwidth { ids, limits }).await
    }

    /// Add torrents concurrently and summarise the failures.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoActiveServer`] when no server is selected.
    pub async fn add(&self, requests: Vec<AddTorrent>) -> SyncResult<BatchSummary> {
        self.request(|respond_to| SyncCommand::Add {
            requests,
            respond_to,
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped_to_one_second() {
        assert_eq!(clamp_interval(Duration::from_millis(200)), MIN_POLL_INTERVAL);
        assert_eq!(
            clamp_interval(Duration::from_secs(7)),
            Duration::from_secs(7)
        );
    }
}
