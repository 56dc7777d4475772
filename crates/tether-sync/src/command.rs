//! Commands accepted by the sync worker and the completions its spawned calls send back.

use std::time::Duration;

use tether_core::{
    AddTorrent, BatchSummary, CacheSnapshot, ServerEndpoint, SessionCache, SessionSettings,
    SessionStats, Torrent, TorrentFiles, TorrentId, TransmissionResponse,
};
use tether_rpc::RpcResult;
use tokio::sync::oneshot;

use crate::error::SyncResult;
use crate::marks::Seq;
use crate::mutation::{Mutation, OnSuccess};

pub(crate) type Responder<T> = oneshot::Sender<SyncResult<T>>;

pub(crate) enum SyncCommand {
    StartPolling {
        interval: Duration,
        respond_to: oneshot::Sender<Duration>,
    },
    StopPolling {
        respond_to: oneshot::Sender<()>,
    },
    UpdateInterval {
        interval: Duration,
        respond_to: oneshot::Sender<Duration>,
    },
    RefreshNow {
        respond_to: Responder<TransmissionResponse>,
    },
    SwitchServer {
        server: Option<ServerEndpoint>,
        respond_to: Responder<()>,
    },
    Snapshot {
        respond_to: oneshot::Sender<SessionCache>,
    },
    FetchFiles {
        torrent_id: TorrentId,
        respond_to: Responder<TransmissionResponse>,
    },
    FetchSettings {
        respond_to: Responder<TransmissionResponse>,
    },
    Mutate {
        mutation: Mutation,
        respond_to: Responder<TransmissionResponse>,
    },
    Add {
        requests: Vec<AddTorrent>,
        respond_to: Responder<BatchSummary>,
    },
}

/// Result of a spawned daemon call, tagged with the server generation it was
/// dispatched under.
pub(crate) struct Completion {
    pub(crate) generation: u64,
    pub(crate) kind: CompletionKind,
}

pub(crate) enum CompletionKind {
    TorrentList {
        seq: Seq,
        result: RpcResult<Vec<Torrent>>,
    },
    SessionStats {
        seq: Seq,
        result: RpcResult<SessionStats>,
    },
    Files {
        seq: Seq,
        torrent_id: TorrentId,
        result: RpcResult<TorrentFiles>,
        respond_to: Responder<TransmissionResponse>,
    },
    Settings {
        seq: Seq,
        result: RpcResult<SessionSettings>,
        respond_to: Responder<TransmissionResponse>,
    },
    Mutation {
        pending: PendingMutation,
        result: RpcResult<()>,
    },
    Batch {
        summary: BatchSummary,
        respond_to: Responder<BatchSummary>,
    },
}

/// Everything needed to reconcile a mutation once its call returns.
pub(crate) struct PendingMutation {
    pub(crate) label: &'static str,
    pub(crate) seq: Seq,
    pub(crate) snapshot: Option<CacheSnapshot>,
    pub(crate) on_success: OnSuccess,
    pub(crate) alert_on_failure: bool,
    pub(crate) respond_to: Responder<TransmissionResponse>,
}
