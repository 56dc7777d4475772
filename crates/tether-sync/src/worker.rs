//! The task that owns the session cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tether_core::{
    AddTorrent, BatchSummary, CoreError, ServerEndpoint, SessionCache, SessionSettings, Torrent,
    TorrentFiles, TorrentId, TransmissionResponse,
};
use tether_events::{Event, EventBus};
use tether_rpc::{RpcConnector, RpcError, RpcResult, TransmissionRpc};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::auth::{AuthTracker, AuthTransition};
use crate::command::{Completion, CompletionKind, PendingMutation, Responder, SyncCommand};
use crate::error::SyncError;
use crate::handle::clamp_interval;
use crate::marks::{DispatchMarks, Seq};
use crate::mutation::{Guard, Mutation, OnSuccess, Plan, Prepared, status_after};

pub(crate) fn spawn(
    connector: Arc<dyn RpcConnector>,
    events: EventBus,
    interval: Duration,
    mut commands: mpsc::Receiver<SyncCommand>,
) {
    let (completions_tx, mut completions) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut worker = Worker::new(connector, events, interval, completions_tx);
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => worker.handle(command),
                        None => break,
                    }
                }
                Some(completion) = completions.recv() => worker.complete(completion),
                () = next_tick(&mut worker.ticker) => worker.poll(None),
            }
        }
        debug!("sync worker stopped");
    });
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn ticker(period: Duration, immediate: bool) -> Interval {
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn outcome_of<T>(result: &RpcResult<T>) -> TransmissionResponse {
    result
        .as_ref()
        .map_or_else(RpcError::response, |_| TransmissionResponse::Success)
}

/// A caller waiting on both legs of an out-of-band poll.
struct PendingRefresh {
    legs: u8,
    outcome: TransmissionResponse,
    respond_to: Responder<TransmissionResponse>,
}

struct Worker {
    cache: SessionCache,
    events: EventBus,
    connector: Arc<dyn RpcConnector>,
    rpc: Option<Arc<dyn TransmissionRpc>>,
    generation: u64,
    marks: DispatchMarks,
    auth: AuthTracker,
    interval: Duration,
    ticker: Option<Interval>,
    refreshes: HashMap<Seq, PendingRefresh>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl Worker {
    fn new(
        connector: Arc<dyn RpcConnector>,
        events: EventBus,
        interval: Duration,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            cache: SessionCache::new(),
            events,
            connector,
            rpc: None,
            generation: 0,
            marks: DispatchMarks::default(),
            auth: AuthTracker::default(),
            interval: clamp_interval(interval),
            ticker: None,
            refreshes: HashMap::new(),
            completions,
        }
    }

    fn handle(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::StartPolling {
                interval,
                respond_to,
            } => {
                self.interval = clamp_interval(interval);
                self.ticker = Some(ticker(self.interval, true));
                info!(interval_ms = self.interval.as_millis(), "polling started");
                let _ = respond_to.send(self.interval);
            }
            SyncCommand::StopPolling { respond_to } => {
                if self.ticker.take().is_some() {
                    info!("polling stopped");
                }
                let _ = respond_to.send(());
            }
            SyncCommand::UpdateInterval {
                interval,
                respond_to,
            } => {
                self.interval = clamp_interval(interval);
                if self.ticker.is_some() {
                    self.ticker = Some(ticker(self.interval, false));
                }
                debug!(interval_ms = self.interval.as_millis(), "poll interval updated");
                let _ = respond_to.send(self.interval);
            }
            SyncCommand::RefreshNow { respond_to } => self.poll(Some(respond_to)),
            SyncCommand::SwitchServer { server, respond_to } => {
                let _ = respond_to.send(self.switch_server(server));
            }
            SyncCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.cache.clone());
            }
            SyncCommand::FetchFiles {
                torrent_id,
                respond_to,
            } => self.fetch_files(torrent_id, respond_to),
            SyncCommand::FetchSettings { respond_to } => self.fetch_settings(respond_to),
            SyncCommand::Mutate {
                mutation,
                respond_to,
            } => self.mutate(mutation, respond_to),
            SyncCommand::Add {
                requests,
                respond_to,
            } => self.add(requests, respond_to),
        }
    }

    fn server_name(&self) -> String {
        self.cache
            .active_server()
            .map_or_else(|| "none".to_string(), |server| server.name.clone())
    }

    fn dispatch<F>(&self, call: F)
    where
        F: Future<Output = CompletionKind> + Send + 'static,
    {
        let generation = self.generation;
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let kind = call.await;
            let _ = completions.send(Completion { generation, kind });
        });
    }

    fn switch_server(&mut self, server: Option<ServerEndpoint>) -> Result<(), SyncError> {
        let rpc = match &server {
            Some(endpoint) => Some(self.connector.connect(endpoint).map_err(|source| {
                SyncError::Connect {
                    server: endpoint.name.clone(),
                    source,
                }
            })?),
            None => None,
        };
        let name = server.as_ref().map(|endpoint| endpoint.name.clone());

        self.generation += 1;
        self.rpc = rpc;
        self.marks.reset();
        self.auth.reset();
        self.cache.reset_for_server(server);
        if self.ticker.is_some() {
            self.ticker = Some(ticker(self.interval, true));
        }

        info!(
            server = name.as_deref().unwrap_or("none"),
            generation = self.generation,
            "active server switched"
        );
        self.events.publish(Event::ServerSwitched { server: name });
        Ok(())
    }

    fn poll(&mut self, respond_to: Option<Responder<TransmissionResponse>>) {
        let Some(rpc) = self.rpc.clone() else {
            if let Some(respond_to) = respond_to {
                let _ = respond_to.send(Err(SyncError::NoActiveServer));
            }
            return;
        };
        let seq = self.marks.next();
        if let Some(respond_to) = respond_to {
            self.refreshes.insert(
                seq,
                PendingRefresh {
                    legs: 2,
                    outcome: TransmissionResponse::Success,
                    respond_to,
                },
            );
        }
        debug!(generation = self.generation, seq, "poll dispatched");

        let list_rpc = Arc::clone(&rpc);
        self.dispatch(async move {
            CompletionKind::TorrentList {
                seq,
                result: list_rpc.torrent_list().await,
            }
        });
        self.dispatch(async move {
            CompletionKind::SessionStats {
                seq,
                result: rpc.session_stats().await,
            }
        });
    }

    fn fetch_files(&mut self, torrent_id: TorrentId, respond_to: Responder<TransmissionResponse>) {
        let Some(rpc) = self.rpc.clone() else {
            let _ = respond_to.send(Err(SyncError::NoActiveServer));
            return;
        };
        if self.cache.torrent(torrent_id).is_none() {
            let _ = respond_to.send(Err(CoreError::UnknownTorrent { torrent_id }.into()));
            return;
        }
        let seq = self.marks.next();
        self.dispatch(async move {
            CompletionKind::Files {
                seq,
                torrent_id,
                result: rpc.torrent_files(torrent_id).await,
                respond_to,
            }
        });
    }

    fn fetch_settings(&mut self, respond_to: Responder<TransmissionResponse>) {
        let Some(rpc) = self.rpc.clone() else {
            let _ = respond_to.send(Err(SyncError::NoActiveServer));
            return;
        };
        let seq = self.marks.next();
        self.dispatch(async move {
            CompletionKind::Settings {
                seq,
                result: rpc.session_settings().await,
                respond_to,
            }
        });
    }

    fn mutate(&mut self, mutation: Mutation, respond_to: Responder<TransmissionResponse>) {
        let Some(rpc) = self.rpc.clone() else {
            let _ = respond_to.send(Err(SyncError::NoActiveServer));
            return;
        };
        let label = mutation.label();
        let plan = match mutation.prepare(&mut self.cache) {
            Ok(Prepared::Dispatch(plan)) => plan,
            Ok(Prepared::Done(outcome)) => {
                debug!(action = label, "mutation has nothing to send");
                let _ = respond_to.send(Ok(outcome));
                return;
            }
            Err(err) => {
                debug!(action = label, error = %err, "mutation rejected locally");
                let _ = respond_to.send(Err(err));
                return;
            }
        };

        let seq = self.marks.next();
        let Plan {
            call,
            snapshot,
            guard,
            on_success,
            alert_on_failure,
        } = plan;
        match guard {
            Guard::None => {}
            Guard::Torrents(ids) => self.marks.mark_torrents(&ids, seq),
            Guard::Files(torrent_id) => self.marks.mark_files(torrent_id, seq),
            Guard::Settings => self.marks.mark_settings(seq),
        }
        debug!(action = label, seq, "mutation dispatched");

        let pending = PendingMutation {
            label,
            seq,
            snapshot,
            on_success,
            alert_on_failure,
            respond_to,
        };
        self.dispatch(async move {
            let result = call.send(rpc.as_ref()).await;
            CompletionKind::Mutation { pending, result }
        });
    }

    fn add(&mut self, requests: Vec<AddTorrent>, respond_to: Responder<BatchSummary>) {
        let Some(rpc) = self.rpc.clone() else {
            let _ = respond_to.send(Err(SyncError::NoActiveServer));
            return;
        };
        if requests.is_empty() {
            let _ = respond_to.send(Ok(BatchSummary::default()));
            return;
        }
        self.dispatch(async move {
            let results = join_all(requests.iter().map(|request| rpc.add_torrent(request))).await;
            let mut summary = BatchSummary::default();
            for (request, result) in requests.iter().zip(results) {
                match result {
                    Ok(added) => {
                        debug!(
                            torrent_id = added.id,
                            duplicate = added.duplicate,
                            "torrent added"
                        );
                        summary.record_success();
                    }
                    Err(err) => summary.record_failure(&request.label, &err.detail()),
                }
            }
            CompletionKind::Batch {
                summary,
                respond_to,
            }
        });
    }

    fn complete(&mut self, completion: Completion) {
        let Completion { generation, kind } = completion;
        let current = generation == self.generation;
        match kind {
            CompletionKind::TorrentList { seq, result } => {
                let outcome = outcome_of(&result);
                if current {
                    self.apply_torrent_list(seq, result);
                } else {
                    debug!(generation, seq, "discarding torrent list from previous server");
                }
                self.settle_refresh(seq, Some(outcome));
            }
            CompletionKind::SessionStats { seq, result } => {
                match result {
                    Ok(stats) if current => {
                        self.cache.replace_session_stats(stats);
                        self.events.publish(Event::SessionStatsRefreshed);
                    }
                    Ok(_) => debug!(generation, seq, "discarding stats from previous server"),
                    Err(err) => debug!(
                        error = %err,
                        outcome = err.response().as_str(),
                        "session stats poll failed"
                    ),
                }
                self.settle_refresh(seq, None);
            }
            CompletionKind::Files {
                seq,
                torrent_id,
                result,
                respond_to,
            } => {
                let outcome = outcome_of(&result);
                if current {
                    self.apply_files(seq, torrent_id, result);
                }
                let _ = respond_to.send(Ok(outcome));
            }
            CompletionKind::Settings {
                seq,
                result,
                respond_to,
            } => {
                let outcome = outcome_of(&result);
                if current {
                    self.apply_settings(seq, result);
                }
                let _ = respond_to.send(Ok(outcome));
            }
            CompletionKind::Mutation { pending, result } => {
                self.reconcile(current, pending, result);
            }
            CompletionKind::Batch {
                summary,
                respond_to,
            } => {
                if current {
                    if summary.has_failures() {
                        warn!(
                            failed = summary.failed(),
                            total = summary.total(),
                            "torrent add batch had failures"
                        );
                        self.events.publish(Event::BatchFailed {
                            action: "add".to_string(),
                            brief: summary.brief(),
                            detail: summary.detail(),
                            failed: summary.failed(),
                        });
                    }
                    if summary.succeeded() > 0 {
                        self.poll(None);
                    }
                }
                let _ = respond_to.send(Ok(summary));
            }
        }
    }

    fn apply_torrent_list(&mut self, seq: Seq, result: RpcResult<Vec<Torrent>>) {
        self.observe_auth(outcome_of(&result));
        match result {
            Ok(torrents) => {
                if self.marks.list_is_outdated(seq) {
                    debug!(seq, "discarding torrent list older than the applied one");
                    return;
                }
                let marks = &self.marks;
                self.cache
                    .replace_torrents(torrents, |id| marks.torrent_is_newer(id, seq));
                self.marks.list_applied(seq);
                self.events.publish(Event::TorrentsRefreshed {
                    count: self.cache.torrents().len(),
                });
            }
            Err(err) => debug!(
                error = %err,
                outcome = err.response().as_str(),
                "torrent list poll failed"
            ),
        }
    }

    fn observe_auth(&mut self, outcome: TransmissionResponse) {
        match self.auth.observe(outcome, self.cache.connection_error()) {
            AuthTransition::Unchanged => {}
            AuthTransition::Lost { consecutive } => {
                let server = self.server_name();
                warn!(%server, consecutive, "daemon keeps rejecting credentials");
                self.cache.set_connection_error(true);
                self.events.publish(Event::ConnectionLost {
                    server,
                    consecutive_unauthorized: consecutive,
                });
            }
            AuthTransition::Restored => {
                let server = self.server_name();
                info!(%server, "daemon accepted credentials again");
                self.cache.set_connection_error(false);
                self.events.publish(Event::ConnectionRestored { server });
            }
        }
    }

    fn apply_files(&mut self, seq: Seq, torrent_id: TorrentId, result: RpcResult<TorrentFiles>) {
        match result {
            Ok(files) => {
                if self.marks.files_are_newer(torrent_id, seq) {
                    debug!(torrent_id, seq, "keeping optimistic file stats over stale fetch");
                    return;
                }
                if self.cache.torrent(torrent_id).is_none() {
                    debug!(torrent_id, "torrent vanished before its file list arrived");
                    return;
                }
                self.cache.store_files(torrent_id, files);
                self.marks.files_applied(torrent_id, seq);
                self.events.publish(Event::FilesRefreshed { torrent_id });
            }
            Err(err) => debug!(torrent_id, error = %err, "file list fetch failed"),
        }
    }

    fn apply_settings(&mut self, seq: Seq, result: RpcResult<SessionSettings>) {
        match result {
            Ok(settings) => {
                if self.marks.settings_are_newer(seq) {
                    debug!(seq, "keeping optimistic settings over stale fetch");
                    return;
                }
                self.cache.replace_session_settings(settings);
                self.events.publish(Event::SessionSettingsRefreshed);
            }
            Err(err) => debug!(error = %err, "session settings fetch failed"),
        }
    }

    fn reconcile(&mut self, current: bool, pending: PendingMutation, result: RpcResult<()>) {
        let PendingMutation {
            label,
            seq,
            snapshot,
            on_success,
            alert_on_failure,
            respond_to,
        } = pending;
        let outcome = outcome_of(&result);

        if !current {
            debug!(action = label, "mutation finished after a server switch");
        } else if let Err(err) = result {
            if let Some(snapshot) = snapshot {
                self.cache.restore(snapshot);
            }
            if alert_on_failure {
                warn!(
                    action = label,
                    outcome = outcome.as_str(),
                    error = %err,
                    "mutation failed; optimistic change reverted"
                );
                self.events.publish(Event::MutationFailed {
                    action: label.to_string(),
                    outcome,
                    brief: format!("{label} failed"),
                    detail: err.detail(),
                });
            } else {
                debug!(action = label, outcome = outcome.as_str(), "mutation failed");
            }
        } else {
            self.apply_success(seq, on_success);
        }

        let _ = respond_to.send(Ok(outcome));
    }

    fn apply_success(&mut self, seq: Seq, on_success: OnSuccess) {
        match on_success {
            OnSuccess::Nothing => {}
            OnSuccess::Status { ids, action } => {
                for &id in &ids {
                    let status = self
                        .cache
                        .torrent(id)
                        .and_then(|torrent| status_after(action, torrent.is_complete()));
                    if let Some(status) = status {
                        self.cache.set_status(&[id], status);
                    }
                }
                self.marks.mark_torrents(&ids, seq);
            }
            OnSuccess::SettingsChanged => {
                self.events.publish(Event::SessionSettingsRefreshed);
            }
        }
    }

    fn settle_refresh(&mut self, seq: Seq, list_outcome: Option<TransmissionResponse>) {
        let Some(pending) = self.refreshes.get_mut(&seq) else {
            return;
        };
        if let Some(outcome) = list_outcome {
            pending.outcome = outcome;
        }
        pending.legs = pending.legs.saturating_sub(1);
        if pending.legs == 0
            && let Some(done) = self.refreshes.remove(&seq)
        {
            let _ = done.respond_to.send(Ok(done.outcome));
        }
    }
}
