//! Scripted daemon doubles for driving the sync engine without HTTP.
//!
//! [`ScriptedRpc`] answers every call from in-memory state. Outcomes can be
//! queued per operation, and a [`Gate`] can hold an operation in flight until
//! the test releases it, which is how interleavings are reproduced.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tether_core::{
    AddTorrent, AddedTorrent, QueueMove, ServerEndpoint, SessionSettings,
    SessionSettingsChangeset, SessionStats, Torrent, TorrentAction, TorrentChangeset,
    TorrentFiles, TorrentId, TransmissionResponse,
};
use tether_rpc::{RpcConnector, RpcError, RpcResult, TransmissionRpc};
use tokio::sync::Semaphore;

/// Daemon operations the double distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcOp {
    /// `torrent-get` for the list.
    TorrentList,
    /// `session-stats`.
    SessionStats,
    /// `session-get`.
    SessionSettings,
    /// `session-set`.
    SetSession,
    /// `torrent-get` for one file list.
    TorrentFiles,
    /// `torrent-add`.
    AddTorrent,
    /// `torrent-remove`.
    RemoveTorrents,
    /// `torrent-set`.
    SetTorrents,
    /// `torrent-rename-path`.
    RenamePath,
    /// `queue-move-*`.
    QueueMove,
    /// `torrent-start`, `torrent-stop`, and friends.
    TorrentAction,
}

/// One recorded call with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// Torrent list fetch.
    TorrentList,
    /// Statistics fetch.
    SessionStats,
    /// Settings fetch.
    SessionSettings,
    /// Settings write.
    SetSession(SessionSettingsChangeset),
    /// File list fetch.
    TorrentFiles(TorrentId),
    /// Add by label.
    AddTorrent(String),
    /// Removal.
    RemoveTorrents {
        /// Removed ids.
        ids: Vec<TorrentId>,
        /// Whether data was deleted.
        delete_local_data: bool,
    },
    /// Changeset write.
    SetTorrents {
        /// Target ids.
        ids: Vec<TorrentId>,
        /// Changes sent.
        changes: TorrentChangeset,
    },
    /// Rename.
    RenamePath {
        /// Target id.
        id: TorrentId,
        /// Old path.
        path: String,
        /// New name.
        name: String,
    },
    /// Queue move.
    QueueMove {
        /// Target ids.
        ids: Vec<TorrentId>,
        /// Direction.
        direction: QueueMove,
    },
    /// Start/stop/verify/reannounce.
    TorrentAction {
        /// Target ids.
        ids: Vec<TorrentId>,
        /// Action sent.
        action: TorrentAction,
    },
}

/// Holds an operation in flight until released.
#[derive(Debug)]
pub struct Gate {
    entered: Semaphore,
    released: Semaphore,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            entered: Semaphore::new(0),
            released: Semaphore::new(0),
        }
    }
}

impl Gate {
    /// Wait until a gated call has started.
    pub async fn entered(&self) {
        if let Ok(permit) = self.entered.acquire().await {
            permit.forget();
        }
    }

    /// Let one gated call proceed.
    pub fn release(&self) {
        self.released.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.add_permits(1);
        if let Ok(permit) = self.released.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Debug, Default)]
struct DaemonState {
    torrents: Vec<Torrent>,
    stats: SessionStats,
    settings: SessionSettings,
    files: BTreeMap<TorrentId, TorrentFiles>,
    outcomes: HashMap<RpcOp, VecDeque<TransmissionResponse>>,
    gates: HashMap<RpcOp, Arc<Gate>>,
    rejected_adds: HashMap<String, TransmissionResponse>,
    calls: Vec<RecordedCall>,
    next_added_id: TorrentId,
}

/// In-memory stand-in for one daemon.
#[derive(Debug, Default)]
pub struct ScriptedRpc {
    state: Mutex<DaemonState>,
}

impl ScriptedRpc {
    /// Empty daemon answering every call with success.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Daemon pre-loaded with a torrent list and statistics.
    #[must_use]
    pub fn with_torrents(torrents: Vec<Torrent>, stats: SessionStats) -> Self {
        let rpc = Self::new();
        rpc.set_torrents_data(torrents);
        rpc.set_stats_data(stats);
        rpc
    }

    fn state(&self) -> MutexGuard<'_, DaemonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the torrent list served by `torrent-get`.
    pub fn set_torrents_data(&self, torrents: Vec<Torrent>) {
        self.state().torrents = torrents;
    }

    /// Replace the statistics served by `session-stats`.
    pub fn set_stats_data(&self, stats: SessionStats) {
        self.state().stats = stats;
    }

    /// Replace the settings served by `session-get`.
    pub fn set_settings_data(&self, settings: SessionSettings) {
        self.state().settings = settings;
    }

    /// Serve `files` for torrent `id`.
    pub fn set_files_data(&self, id: TorrentId, files: TorrentFiles) {
        self.state().files.insert(id, files);
    }

    /// Queue an outcome for the next call to `op`; calls without a queued
    /// outcome succeed.
    pub fn push_outcome(&self, op: RpcOp, outcome: TransmissionResponse) {
        self.state()
            .outcomes
            .entry(op)
            .or_default()
            .push_back(outcome);
    }

    /// Queue the same outcome for the next `count` calls to `op`.
    pub fn push_outcomes(&self, op: RpcOp, outcome: TransmissionResponse, count: usize) {
        for _ in 0..count {
            self.push_outcome(op, outcome);
        }
    }

    /// Reject adds carrying `label` with `outcome`.
    pub fn reject_add(&self, label: &str, outcome: TransmissionResponse) {
        self.state().rejected_adds.insert(label.to_string(), outcome);
    }

    /// Hold every subsequent call to `op` until the returned gate releases it.
    pub fn gate(&self, op: RpcOp) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.state().gates.insert(op, Arc::clone(&gate));
        gate
    }

    /// Stop holding calls to `op`.
    pub fn ungate(&self, op: RpcOp) {
        self.state().gates.remove(&op);
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Number of calls received for `op`.
    #[must_use]
    pub fn call_count(&self, op: RpcOp) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call_op(call) == op)
            .count()
    }

    async fn enter(&self, call: RecordedCall) -> RpcResult<()> {
        let op = call_op(&call);
        let gate = {
            let mut state = self.state();
            state.calls.push(call);
            state.gates.get(&op).cloned()
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
        let outcome = self
            .state()
            .outcomes
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .unwrap_or(TransmissionResponse::Success);
        scripted(op, outcome)
    }
}

const fn call_op(call: &RecordedCall) -> RpcOp {
    match call {
        RecordedCall::TorrentList => RpcOp::TorrentList,
        RecordedCall::SessionStats => RpcOp::SessionStats,
        RecordedCall::SessionSettings => RpcOp::SessionSettings,
        RecordedCall::SetSession(_) => RpcOp::SetSession,
        RecordedCall::TorrentFiles(_) => RpcOp::TorrentFiles,
        RecordedCall::AddTorrent(_) => RpcOp::AddTorrent,
        RecordedCall::RemoveTorrents { .. } => RpcOp::RemoveTorrents,
        RecordedCall::SetTorrents { .. } => RpcOp::SetTorrents,
        RecordedCall::RenamePath { .. } => RpcOp::RenamePath,
        RecordedCall::QueueMove { .. } => RpcOp::QueueMove,
        RecordedCall::TorrentAction { .. } => RpcOp::TorrentAction,
    }
}

/// Build the error a real client would raise for `outcome`.
fn scripted(op: RpcOp, outcome: TransmissionResponse) -> RpcResult<()> {
    let method = match op {
        RpcOp::TorrentList | RpcOp::TorrentFiles => "torrent-get",
        RpcOp::SessionStats => "session-stats",
        RpcOp::SessionSettings => "session-get",
        RpcOp::SetSession => "session-set",
        RpcOp::AddTorrent => "torrent-add",
        RpcOp::RemoveTorrents => "torrent-remove",
        RpcOp::SetTorrents => "torrent-set",
        RpcOp::RenamePath => "torrent-rename-path",
        RpcOp::QueueMove => "queue-move",
        RpcOp::TorrentAction => "torrent-action",
    };
    match outcome {
        TransmissionResponse::Success => Ok(()),
        TransmissionResponse::Unauthorized => Err(RpcError::Unauthorized { status: 401 }),
        TransmissionResponse::ConfigError => Err(RpcError::Rejected {
            method,
            result: "scripted rejection".to_string(),
        }),
        TransmissionResponse::Failed => Err(RpcError::Malformed {
            method,
            reason: "scripted failure".to_string(),
        }),
    }
}

#[async_trait]
impl TransmissionRpc for ScriptedRpc {
    async fn torrent_list(&self) -> RpcResult<Vec<Torrent>> {
        self.enter(RecordedCall::TorrentList).await?;
        Ok(self.state().torrents.clone())
    }

    async fn session_stats(&self) -> RpcResult<SessionStats> {
        self.enter(RecordedCall::SessionStats).await?;
        Ok(self.state().stats)
    }

    async fn session_settings(&self) -> RpcResult<SessionSettings> {
        self.enter(RecordedCall::SessionSettings).await?;
        Ok(self.state().settings.clone())
    }

    async fn set_session(&self, changes: &SessionSettingsChangeset) -> RpcResult<()> {
        self.enter(RecordedCall::SetSession(changes.clone())).await
    }

    async fn torrent_files(&self, id: TorrentId) -> RpcResult<TorrentFiles> {
        self.enter(RecordedCall::TorrentFiles(id)).await?;
        self.state()
            .files
            .get(&id)
            .cloned()
            .ok_or_else(|| RpcError::Malformed {
                method: "torrent-get",
                reason: format!("torrent {id} missing from response"),
            })
    }

    async fn add_torrent(&self, request: &AddTorrent) -> RpcResult<AddedTorrent> {
        self.enter(RecordedCall::AddTorrent(request.label.clone()))
            .await?;
        let rejection = self.state().rejected_adds.get(&request.label).copied();
        if let Some(outcome) = rejection {
            scripted(RpcOp::AddTorrent, outcome)?;
        }
        let mut state = self.state();
        state.next_added_id += 1;
        Ok(AddedTorrent {
            id: 1_000 + state.next_added_id,
            name: request.label.clone(),
            hash_string: format!("{:040x}", state.next_added_id),
            duplicate: false,
        })
    }

    async fn remove_torrents(&self, ids: &[TorrentId], delete_local_data: bool) -> RpcResult<()> {
        self.enter(RecordedCall::RemoveTorrents {
            ids: ids.to_vec(),
            delete_local_data,
        })
        .await
    }

    async fn set_torrents(&self, ids: &[TorrentId], changes: &TorrentChangeset) -> RpcResult<()> {
        self.enter(RecordedCall::SetTorrents {
            ids: ids.to_vec(),
            changes: changes.clone(),
        })
        .await
    }

    async fn rename_path(&self, id: TorrentId, path: &str, name: &str) -> RpcResult<()> {
        self.enter(RecordedCall::RenamePath {
            id,
            path: path.to_string(),
            name: name.to_string(),
        })
        .await
    }

    async fn queue_move(&self, ids: &[TorrentId], direction: QueueMove) -> RpcResult<()> {
        self.enter(RecordedCall::QueueMove {
            ids: ids.to_vec(),
            direction,
        })
        .await
    }

    async fn torrent_action(&self, ids: &[TorrentId], action: TorrentAction) -> RpcResult<()> {
        self.enter(RecordedCall::TorrentAction {
            ids: ids.to_vec(),
            action,
        })
        .await
    }
}

/// Connector handing out pre-registered scripted daemons by server name.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    daemons: Mutex<HashMap<String, Arc<ScriptedRpc>>>,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    /// Connector with no registered daemons.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rpc` as the daemon behind server `name`.
    pub fn register(&self, name: &str, rpc: Arc<ScriptedRpc>) {
        self.daemons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), rpc);
    }

    /// Number of successful connects so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl RpcConnector for ScriptedConnector {
    fn connect(&self, server: &ServerEndpoint) -> RpcResult<Arc<dyn TransmissionRpc>> {
        let rpc = self
            .daemons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&server.name)
            .cloned()
            .ok_or_else(|| RpcError::InvalidEndpoint {
                reason: format!("no scripted daemon for '{}'", server.name),
            })?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(rpc)
    }
}
