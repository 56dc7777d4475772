//! Mutation kinds and how each one maps onto the cache and the daemon.
//!
//! Preparing a mutation validates it against the cache, captures a snapshot,
//! and applies the optimistic change in one step; nothing is touched when
//! validation fails. The worker then dispatches the daemon call and either
//! keeps the change or restores the snapshot.

use tether_core::{
    BandwidthLimits, CacheSnapshot, CoreError, FilePriority, QueueMove, SessionCache,
    SessionSettings, SessionSettingsChangeset, TorrentAction, TorrentChangeset, TorrentId,
    TorrentStatus, TransmissionResponse, validate_rename,
};
use tether_rpc::{RpcResult, TransmissionRpc};

use crate::error::{SyncError, SyncResult};

/// A user-initiated change to daemon state.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Mark files wanted or unwanted.
    SetWanted {
        /// Torrent owning the files.
        torrent_id: TorrentId,
        /// File indices.
        indices: Vec<usize>,
        /// New wanted flag.
        wanted: bool,
    },
    /// Set one priority on several files.
    SetPriority {
        /// Torrent owning the files.
        torrent_id: TorrentId,
        /// File indices.
        indices: Vec<usize>,
        /// New priority.
        priority: FilePriority,
    },
    /// Rename a torrent's root path.
    Rename {
        /// Torrent to rename.
        torrent_id: TorrentId,
        /// New root name.
        name: String,
    },
    /// Replace the labels of several torrents.
    SetLabels {
        /// Target torrents.
        ids: Vec<TorrentId>,
        /// New label set.
        labels: Vec<String>,
    },
    /// Remove torrents.
    Remove {
        /// Target torrents.
        ids: Vec<TorrentId>,
        /// Also delete downloaded data.
        delete_local_data: bool,
    },
    /// Start, stop, verify, or reannounce.
    Action {
        /// Target torrents.
        ids: Vec<TorrentId>,
        /// Action to perform.
        action: TorrentAction,
    },
    /// Move torrents within the daemon queue.
    QueueMove {
        /// Target torrents.
        ids: Vec<TorrentId>,
        /// Direction.
        direction: QueueMove,
    },
    /// Change per-torrent bandwidth limits.
    SetBandwidth {
        /// Target torrents.
        ids: Vec<TorrentId>,
        /// Fields to change.
        limits: BandwidthLimits,
    },
    /// Write the settings that differ from the cached ones.
    UpdateSettings {
        /// Desired settings.
        desired: Box<SessionSettings>,
    },
}

impl Mutation {
    /// Short label used in logs and failure notifications.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::SetWanted { .. } => "set_wanted",
            Self::SetPriority { .. } => "set_priority",
            Self::Rename { .. } => "rename",
            Self::SetLabels { .. } => "set_labels",
            Self::Remove { .. } => "remove",
            Self::Action { action, .. } => match action {
                TorrentAction::Start => "start",
                TorrentAction::StartNow => "start_now",
                TorrentAction::Stop => "stop",
                TorrentAction::Verify => "verify",
                TorrentAction::Reannounce => "reannounce",
            },
            Self::QueueMove { .. } => "queue_move",
            Self::SetBandwidth { .. } => "set_bandwidth",
            Self::UpdateSettings { .. } => "update_settings",
        }
    }

    /// Validate against the cache, snapshot, and apply the optimistic change.
    pub(crate) fn prepare(self, cache: &mut SessionCache) -> SyncResult<Prepared> {
        let plan = match self {
            Self::SetWanted {
                torrent_id,
                indices,
                wanted,
            } => {
                let snapshot = cache.set_files_wanted(torrent_id, &indices, wanted)?;
                Plan {
                    call: DaemonCall::SetTorrents {
                        ids: vec![torrent_id],
                        changes: TorrentChangeset::wanted(indices, wanted),
                    },
                    snapshot: Some(snapshot),
                    guard: Guard::Files(torrent_id),
                    on_success: OnSuccess::Nothing,
                    alert_on_failure: true,
                }
            }
            Self::SetPriority {
                torrent_id,
                indices,
                priority,
            } => {
                let snapshot = cache.set_files_priority(torrent_id, &indices, priority)?;
                Plan {
                    call: DaemonCall::SetTorrents {
                        ids: vec![torrent_id],
                        changes: TorrentChangeset::priority(indices, priority),
                    },
                    snapshot: Some(snapshot),
                    guard: Guard::Files(torrent_id),
                    on_success: OnSuccess::Nothing,
                    alert_on_failure: true,
                }
            }
            Self::Rename { torrent_id, name } => {
                validate_rename(&name)?;
                let path = cache
                    .torrent(torrent_id)
                    .map(|torrent| torrent.name.clone())
                    .ok_or(CoreError::UnknownTorrent { torrent_id })?;
                let snapshot = cache.rename_torrent(torrent_id, &name)?;
                Plan {
                    call: DaemonCall::RenamePath {
                        id: torrent_id,
                        path,
                        name,
                    },
                    snapshot: Some(snapshot),
                    guard: Guard::Torrents(vec![torrent_id]),
                    on_success: OnSuccess::Nothing,
                    alert_on_failure: true,
                }
            }
            Self::SetLabels { ids, labels } => {
                let snapshot = cache.set_labels(&ids, &labels)?;
                Plan {
                    call: DaemonCall::SetTorrents {
                        ids: ids.clone(),
                        changes: TorrentChangeset::labels(labels),
                    },
                    snapshot: Some(snapshot),
                    guard: Guard::Torrents(ids),
                    on_success: OnSuccess::Nothing,
                    alert_on_failure: true,
                }
            }
            Self::Remove {
                ids,
                delete_local_data,
            } => {
                let snapshot = cache.remove_torrents(&ids)?;
                Plan {
                    call: DaemonCall::Remove {
                        ids: ids.clone(),
                        delete_local_data,
                    },
                    snapshot: Some(snapshot),
                    guard: Guard::Torrents(ids),
                    on_success: OnSuccess::Nothing,
                    alert_on_failure: true,
                }
            }
            Self::Action { ids, action } => {
                require_known(cache, &ids)?;
                let toggles = matches!(action, TorrentAction::Start | TorrentAction::Stop);
                Plan {
                    call: DaemonCall::Action {
                        ids: ids.clone(),
                        action,
                    },
                    snapshot: None,
                    guard: Guard::None,
                    on_success: if toggles {
                        OnSuccess::Status { ids, action }
                    } else {
                        OnSuccess::Nothing
                    },
                    alert_on_failure: !toggles,
                }
            }
            Self::QueueMove { ids, direction } => {
                require_known(cache, &ids)?;
                Plan {
                    call: DaemonCall::QueueMove { ids, direction },
                    snapshot: None,
                    guard: Guard::None,
                    on_success: OnSuccess::Nothing,
                    alert_on_failure: true,
                }
            }
            Self::SetBandwidth { ids, limits } => {
                require_known(cache, &ids)?;
                if limits.is_empty() {
                    return Ok(Prepared::Done(TransmissionResponse::Success));
                }
                Plan {
                    call: DaemonCall::SetTorrents {
                        ids,
                        changes: TorrentChangeset::bandwidth(limits),
                    },
                    snapshot: None,
                    guard: Guard::None,
                    on_success: OnSuccess::Nothing,
                    alert_on_failure: true,
                }
            }
            Self::UpdateSettings { desired } => {
                let current = cache
                    .session_settings()
                    .cloned()
                    .ok_or(SyncError::SettingsNotLoaded)?;
                let changes = SessionSettingsChangeset::diff(&current, &desired);
                if changes.is_empty() {
                    return Ok(Prepared::Done(TransmissionResponse::Success));
                }
                let mut next = current;
                changes.apply_to(&mut next);
                let snapshot = cache.replace_session_settings(next);
                Plan {
                    call: DaemonCall::SetSession(changes),
                    snapshot: Some(snapshot),
                    guard: Guard::Settings,
                    on_success: OnSuccess::SettingsChanged,
                    alert_on_failure: true,
                }
            }
        };
        Ok(Prepared::Dispatch(plan))
    }
}

fn require_known(cache: &SessionCache, ids: &[TorrentId]) -> Result<(), CoreError> {
    if ids.is_empty() {
        return Err(CoreError::EmptySelection);
    }
    if let Some(&torrent_id) = ids.iter().find(|&&id| cache.torrent(id).is_none()) {
        return Err(CoreError::UnknownTorrent { torrent_id });
    }
    Ok(())
}

/// Status shown after a successful start or stop.
pub(crate) const fn status_after(action: TorrentAction, complete: bool) -> Option<TorrentStatus> {
    match action {
        TorrentAction::Stop => Some(TorrentStatus::Stopped),
        TorrentAction::Start if complete => Some(TorrentStatus::Seeding),
        TorrentAction::Start => Some(TorrentStatus::Downloading),
        TorrentAction::StartNow | TorrentAction::Verify | TorrentAction::Reannounce => None,
    }
}

pub(crate) enum Prepared {
    /// Dispatch the call and reconcile on completion.
    Dispatch(Plan),
    /// Nothing to send; complete immediately.
    Done(TransmissionResponse),
}

pub(crate) struct Plan {
    pub(crate) call: DaemonCall,
    pub(crate) snapshot: Option<CacheSnapshot>,
    pub(crate) guard: Guard,
    pub(crate) on_success: OnSuccess,
    pub(crate) alert_on_failure: bool,
}

/// Entities whose optimistic state stale reads must not overwrite.
pub(crate) enum Guard {
    None,
    Torrents(Vec<TorrentId>),
    Files(TorrentId),
    Settings,
}

pub(crate) enum OnSuccess {
    Nothing,
    Status {
        ids: Vec<TorrentId>,
        action: TorrentAction,
    },
    SettingsChanged,
}

pub(crate) enum DaemonCall {
    SetTorrents {
        ids: Vec<TorrentId>,
        changes: TorrentChangeset,
    },
    RenamePath {
        id: TorrentId,
        path: String,
        name: String,
    },
    Remove {
        ids: Vec<TorrentId>,
        delete_local_data: bool,
    },
    QueueMove {
        ids: Vec<TorrentId>,
        direction: QueueMove,
    },
    Action {
        ids: Vec<TorrentId>,
        action: TorrentAction,
    },
    SetSession(SessionSettingsChangeset),
}

impl DaemonCall {
    pub(crate) async fn send(self, rpc: &dyn TransmissionRpc) -> RpcResult<()> {
        match self {
            Self::SetTorrents { ids, changes } => rpc.set_torrents(&ids, &changes).await,
            Self::RenamePath { id, path, name } => rpc.rename_path(id, &path, &name).await,
            Self::Remove {
                ids,
                delete_local_data,
            } => rpc.remove_torrents(&ids, delete_local_data).await,
            Self::QueueMove { ids, direction } => rpc.queue_move(&ids, direction).await,
            Self::Action { ids, action } => rpc.torrent_action(&ids, action).await,
            Self::SetSession(changes) => rpc.set_session(&changes).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{Torrent, TorrentFile, TorrentFileStats, TorrentFiles};

    fn torrent(id: TorrentId, name: &str) -> Torrent {
        Torrent {
            id,
            name: name.into(),
            status: TorrentStatus::Stopped,
            is_stalled: false,
            metadata_percent_complete: 1.0,
            percent_done: 0.0,
            downloaded_ever: 0,
            uploaded_ever: 0,
            total_size: 0,
            left_until_done: 0,
            rate_download: 0,
            rate_upload: 0,
            peers_connected: 0,
            peers_sending_to_us: 0,
            peers_getting_from_us: 0,
            eta: None,
            upload_ratio: 0.0,
            queue_position: 0,
            labels: Vec::new(),
            added_at: None,
            download_dir: String::new(),
            error_string: String::new(),
        }
    }

    fn cache() -> SessionCache {
        let mut cache = SessionCache::new();
        cache.replace_torrents(vec![torrent(1, "one"), torrent(2, "two")], |_| false);
        let files = TorrentFiles::new(
            vec![TorrentFile {
                name: "one/a.bin".into(),
                length: 1,
            }],
            vec![TorrentFileStats {
                bytes_completed: 0,
                wanted: true,
                priority: FilePriority::Normal,
            }],
        )
        .expect("aligned");
        cache.store_files(1, files);
        cache
    }

    #[test]
    fn invalid_rename_leaves_cache_untouched() {
        let mut cache = cache();
        let before = cache.clone();
        let err = Mutation::Rename {
            torrent_id: 1,
            name: "a/b".into(),
        }
        .prepare(&mut cache)
        .err()
        .expect("separator is rejected");
        assert!(matches!(
            err,
            SyncError::Core(CoreError::InvalidName {
                reason: "path_separator"
            })
        ));
        assert_eq!(cache, before);
    }

    #[test]
    fn rename_sends_old_root_as_path() {
        let mut cache = cache();
        let Ok(Prepared::Dispatch(plan)) = (Mutation::Rename {
            torrent_id: 1,
            name: "uno".into(),
        })
        .prepare(&mut cache) else {
            panic!("rename should dispatch");
        };
        assert!(matches!(
            plan.call,
            DaemonCall::RenamePath { ref path, ref name, .. } if path == "one" && name == "uno"
        ));
        assert_eq!(cache.files(1).map(|f| f.files()[0].name.as_str()), Some("uno/a.bin"));
    }

    #[test]
    fn actions_require_cached_torrents() {
        let mut cache = cache();
        let err = Mutation::Action {
            ids: vec![1, 99],
            action: TorrentAction::Verify,
        }
        .prepare(&mut cache)
        .err()
        .expect("unknown id");
        assert!(matches!(
            err,
            SyncError::Core(CoreError::UnknownTorrent { torrent_id: 99 })
        ));
    }

    #[test]
    fn settings_need_a_baseline() {
        let mut cache = cache();
        let err = Mutation::UpdateSettings {
            desired: Box::default(),
        }
        .prepare(&mut cache)
        .err()
        .expect("settings not fetched");
        assert!(matches!(err, SyncError::SettingsNotLoaded));
    }

    #[test]
    fn start_status_depends_on_completion() {
        assert_eq!(
            status_after(TorrentAction::Start, true),
            Some(TorrentStatus::Seeding)
        );
        assert_eq!(
            status_after(TorrentAction::Start, false),
            Some(TorrentStatus::Downloading)
        );
        assert_eq!(
            status_after(TorrentAction::Stop, true),
            Some(TorrentStatus::Stopped)
        );
        assert_eq!(status_after(TorrentAction::Verify, false), None);
    }
}
