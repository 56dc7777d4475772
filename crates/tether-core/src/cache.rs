//! The session cache: single-writer store of the known torrent list and
//! session statistics, plus the snapshot/restore primitives used to unwind
//! optimistic mutations.
//!
//! # Design
//! - Torrents are reconciled by id, never by position; the polled order is
//!   the stored order and views sort independently.
//! - File lists are stored separately from torrents and keyed by id; the file
//!   and file-stat arrays stay positionally aligned through every operation.
//! - Every mutating helper validates all of its targets before touching any
//!   of them and returns a [`CacheSnapshot`] that restores the exact prior
//!   state.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::model::{
    FilePriority, ServerEndpoint, SessionSettings, SessionStats, Torrent, TorrentFileStats,
    TorrentFiles, TorrentId, TorrentStatus,
};

/// In-memory view of the active daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCache {
    active_server: Option<ServerEndpoint>,
    torrents: Vec<Torrent>,
    session_stats: Option<SessionStats>,
    session_settings: Option<SessionSettings>,
    files: BTreeMap<TorrentId, TorrentFiles>,
    connection_error: bool,
}

/// Pre-mutation state sufficient to undo one optimistic mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheSnapshot {
    /// Prior file stats of one torrent, by file index.
    FileStats {
        /// Torrent owning the files.
        torrent_id: TorrentId,
        /// Saved `(index, stats)` pairs.
        entries: Vec<(usize, TorrentFileStats)>,
    },
    /// Prior torrent records, and the file lists the mutation also touched.
    Torrents {
        /// Saved torrent records.
        torrents: Vec<Torrent>,
        /// Saved file lists.
        files: Vec<(TorrentId, TorrentFiles)>,
    },
    /// Torrents removed from the cache along with their original positions.
    Removed {
        /// Saved `(position, torrent, files)` triples in ascending position order.
        entries: Vec<(usize, Torrent, Option<TorrentFiles>)>,
    },
    /// Prior session settings.
    Settings(Option<SessionSettings>),
}

impl SessionCache {
    /// Empty cache with no active server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected daemon.
    #[must_use]
    pub const fn active_server(&self) -> Option<&ServerEndpoint> {
        self.active_server.as_ref()
    }

    /// Torrents in the order of the last applied list response.
    #[must_use]
    pub fn torrents(&self) -> &[Torrent] {
        &self.torrents
    }

    /// Look up one torrent by id.
    #[must_use]
    pub fn torrent(&self, id: TorrentId) -> Option<&Torrent> {
        self.torrents.iter().find(|torrent| torrent.id == id)
    }

    /// Aggregate statistics from the last successful poll.
    #[must_use]
    pub const fn session_stats(&self) -> Option<&SessionStats> {
        self.session_stats.as_ref()
    }

    /// Daemon settings from the last `session-get`.
    #[must_use]
    pub const fn session_settings(&self) -> Option<&SessionSettings> {
        self.session_settings.as_ref()
    }

    /// Lazily fetched file list for one torrent.
    #[must_use]
    pub fn files(&self, id: TorrentId) -> Option<&TorrentFiles> {
        self.files.get(&id)
    }

    /// Whether repeated authorization failures have been escalated.
    #[must_use]
    pub const fn connection_error(&self) -> bool {
        self.connection_error
    }

    /// Select a new daemon and drop everything learned from the previous one.
    pub fn reset_for_server(&mut self, server: Option<ServerEndpoint>) {
        *self = Self {
            active_server: server,
            ..Self::default()
        };
    }

    /// Set the escalated connection-error flag.
    pub const fn set_connection_error(&mut self, value: bool) {
        self.connection_error = value;
    }

    /// Replace the torrent list with a polled snapshot.
    ///
    /// Torrents for which `preserve` returns `true` keep their cached record
    /// (or stay absent if they were removed locally). Duplicate ids keep their
    /// first occurrence. File lists of torrents no longer present are dropped.
    pub fn replace_torrents(
        &mut self,
        incoming: Vec<Torrent>,
        preserve: impl Fn(TorrentId) -> bool,
    ) {
        let mut seen = HashSet::with_capacity(incoming.len());
        let mut next = Vec::with_capacity(incoming.len());
        for torrent in incoming {
            if !seen.insert(torrent.id) {
                continue;
            }
            if preserve(torrent.id) {
                if let Some(cached) = self.torrent(torrent.id) {
                    next.push(cached.clone());
                }
            } else {
                next.push(torrent);
            }
        }
        self.torrents = next;
        self.files.retain(|id, _| seen.contains(id));
    }

    /// Replace the aggregate statistics.
    pub fn replace_session_stats(&mut self, stats: SessionStats) {
        self.session_stats = Some(stats);
    }

    /// Store a freshly fetched file list.
    pub fn store_files(&mut self, id: TorrentId, files: TorrentFiles) {
        self.files.insert(id, files);
    }

    /// Replace the cached settings, returning the prior value for revert.
    pub fn replace_session_settings(&mut self, settings: SessionSettings) -> CacheSnapshot {
        CacheSnapshot::Settings(self.session_settings.replace(settings))
    }

    /// Mark files wanted or unwanted.
    ///
    /// # Errors
    ///
    /// Fails without changing anything when the torrent's file list is not
    /// loaded, the selection is empty, or any index is out of range.
    pub fn set_files_wanted(
        &mut self,
        id: TorrentId,
        indices: &[usize],
        wanted: bool,
    ) -> CoreResult<CacheSnapshot> {
        self.update_file_stats(id, indices, |stats| stats.wanted = wanted)
    }

    /// Set one priority on every selected file.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::set_files_wanted`].
    pub fn set_files_priority(
        &mut self,
        id: TorrentId,
        indices: &[usize],
        priority: FilePriority,
    ) -> CoreResult<CacheSnapshot> {
        self.update_file_stats(id, indices, |stats| stats.priority = priority)
    }

    fn update_file_stats(
        &mut self,
        id: TorrentId,
        indices: &[usize],
        apply: impl Fn(&mut TorrentFileStats),
    ) -> CoreResult<CacheSnapshot> {
        if indices.is_empty() {
            return Err(CoreError::EmptySelection);
        }
        let files = self
            .files
            .get_mut(&id)
            .ok_or(CoreError::FilesNotLoaded { torrent_id: id })?;
        let len = files.len();
        if let Some(&index) = indices.iter().find(|&&index| index >= len) {
            return Err(CoreError::FileIndexOutOfRange {
                torrent_id: id,
                index,
                len,
            });
        }

        let stats = files.stats_mut();
        let entries = indices.iter().map(|&index| (index, stats[index])).collect();
        for &index in indices {
            apply(&mut stats[index]);
        }
        Ok(CacheSnapshot::FileStats {
            torrent_id: id,
            entries,
        })
    }

    /// Rename a torrent's root, rewriting cached file paths under it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTorrent`] when the torrent is not cached.
    pub fn rename_torrent(&mut self, id: TorrentId, new_name: &str) -> CoreResult<CacheSnapshot> {
        let position = self.position(id)?;
        let saved_torrent = self.torrents[position].clone();
        let saved_files: Vec<_> = self
            .files
            .get(&id)
            .map(|files| (id, files.clone()))
            .into_iter()
            .collect();

        let old_name = std::mem::replace(&mut self.torrents[position].name, new_name.to_string());
        if let Some(files) = self.files.get_mut(&id) {
            for file in files.files_mut() {
                if file.name == old_name {
                    file.name = new_name.to_string();
                } else if let Some(rest) = file
                    .name
                    .strip_prefix(old_name.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                {
                    file.name = format!("{new_name}/{rest}");
                }
            }
        }

        Ok(CacheSnapshot::Torrents {
            torrents: vec![saved_torrent],
            files: saved_files,
        })
    }

    /// Replace the label set on every listed torrent.
    ///
    /// # Errors
    ///
    /// Fails without changing anything when the selection is empty or any id
    /// is not cached.
    pub fn set_labels(&mut self, ids: &[TorrentId], labels: &[String]) -> CoreResult<CacheSnapshot> {
        let positions = self.positions(ids)?;
        let saved = positions
            .iter()
            .map(|&position| self.torrents[position].clone())
            .collect();
        for position in positions {
            self.torrents[position].labels = labels.to_vec();
        }
        Ok(CacheSnapshot::Torrents {
            torrents: saved,
            files: Vec::new(),
        })
    }

    /// Overwrite the status of every listed torrent that is still cached.
    pub fn set_status(&mut self, ids: &[TorrentId], status: TorrentStatus) {
        for torrent in &mut self.torrents {
            if ids.contains(&torrent.id) {
                torrent.status = status;
            }
        }
    }

    /// Drop torrents and their file lists.
    ///
    /// # Errors
    ///
    /// Fails without changing anything when the selection is empty or any id
    /// is not cached.
    pub fn remove_torrents(&mut self, ids: &[TorrentId]) -> CoreResult<CacheSnapshot> {
        let mut positions = self.positions(ids)?;
        positions.sort_unstable();
        positions.dedup();

        let mut entries = Vec::with_capacity(positions.len());
        for &position in positions.iter().rev() {
            let torrent = self.torrents.remove(position);
            let files = self.files.remove(&torrent.id);
            entries.push((position, torrent, files));
        }
        entries.reverse();
        Ok(CacheSnapshot::Removed { entries })
    }

    /// Undo one optimistic mutation.
    ///
    /// Entries whose torrent disappeared in the meantime are skipped so a
    /// revert never resurrects a torrent the daemon no longer reports.
    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        match snapshot {
            CacheSnapshot::FileStats {
                torrent_id,
                entries,
            } => {
                if let Some(files) = self.files.get_mut(&torrent_id) {
                    let stats = files.stats_mut();
                    for (index, saved) in entries {
                        if let Some(slot) = stats.get_mut(index) {
                            *slot = saved;
                        }
                    }
                }
            }
            CacheSnapshot::Torrents { torrents, files } => {
                for saved in torrents {
                    if let Some(slot) = self.torrents.iter_mut().find(|t| t.id == saved.id) {
                        *slot = saved;
                    }
                }
                for (id, saved) in files {
                    if self.torrent(id).is_some() {
                        self.files.insert(id, saved);
                    }
                }
            }
            CacheSnapshot::Removed { entries } => {
                for (position, torrent, files) in entries {
                    if self.torrent(torrent.id).is_some() {
                        continue;
                    }
                    let id = torrent.id;
                    let position = position.min(self.torrents.len());
                    self.torrents.insert(position, torrent);
                    if let Some(files) = files {
                        self.files.insert(id, files);
                    }
                }
            }
            CacheSnapshot::Settings(previous) => {
                self.session_settings = previous;
            }
        }
    }

    fn position(&self, id: TorrentId) -> CoreResult<usize> {
        self.torrents
            .iter()
            .position(|torrent| torrent.id == id)
            .ok_or(CoreError::UnknownTorrent { torrent_id: id })
    }

    fn positions(&self, ids: &[TorrentId]) -> CoreResult<Vec<usize>> {
        if ids.is_empty() {
            return Err(CoreError::EmptySelection);
        }
        ids.iter().map(|&id| self.position(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Scheme, TorrentFile};

    fn torrent(id: TorrentId, name: &str) -> Torrent {
        Torrent {
            id,
            name: name.into(),
            status: TorrentStatus::Downloading,
            is_stalled: false,
            metadata_percent_complete: 1.0,
            percent_done: 0.5,
            downloaded_ever: 10,
            uploaded_ever: 0,
            total_size: 20,
            left_until_done: 10,
            rate_download: 5,
            rate_upload: 0,
            peers_connected: 1,
            peers_sending_to_us: 1,
            peers_getting_from_us: 0,
            eta: Some(2),
            upload_ratio: 0.0,
            queue_position: id,
            labels: Vec::new(),
            added_at: None,
            download_dir: "/data".into(),
            error_string: String::new(),
        }
    }

    fn files(root: &str, count: usize) -> TorrentFiles {
        let files = (0..count)
            .map(|index| TorrentFile {
                name: format!("{root}/file-{index}"),
                length: 100,
            })
            .collect();
        let stats = (0..count)
            .map(|_| TorrentFileStats {
                bytes_completed: 0,
                wanted: true,
                priority: FilePriority::Normal,
            })
            .collect();
        TorrentFiles::new(files, stats).expect("aligned")
    }

    fn populated() -> SessionCache {
        let mut cache = SessionCache::new();
        cache.reset_for_server(Some(ServerEndpoint {
            name: "home".into(),
            host: "localhost".into(),
            port: 9091,
            scheme: Scheme::Http,
            rpc_path: "/transmission/rpc".into(),
            credentials: None,
        }));
        cache.replace_torrents(vec![torrent(10, "alpha"), torrent(20, "beta")], |_| false);
        cache.store_files(10, files("alpha", 3));
        cache.store_files(20, files("beta", 1));
        cache
    }

    #[test]
    fn replace_is_idempotent() {
        let mut cache = populated();
        let incoming = vec![torrent(10, "alpha"), torrent(20, "beta")];
        cache.replace_torrents(incoming.clone(), |_| false);
        let once = cache.clone();
        cache.replace_torrents(incoming, |_| false);
        assert_eq!(cache, once);
        assert_eq!(cache.torrents().len(), 2);
    }

    #[test]
    fn replace_drops_duplicates_and_orphaned_files() {
        let mut cache = populated();
        cache.replace_torrents(vec![torrent(20, "beta"), torrent(20, "beta-dup")], |_| false);
        assert_eq!(cache.torrents().len(), 1);
        assert_eq!(cache.torrents()[0].name, "beta");
        assert!(cache.files(10).is_none());
        assert!(cache.files(20).is_some());
    }

    #[test]
    fn replace_preserves_marked_records() {
        let mut cache = populated();
        cache.rename_torrent(10, "renamed").expect("rename");
        cache.replace_torrents(vec![torrent(10, "alpha"), torrent(20, "beta")], |id| id == 10);
        assert_eq!(cache.torrent(10).map(|t| t.name.as_str()), Some("renamed"));
    }

    #[test]
    fn preserved_removed_torrent_stays_absent() {
        let mut cache = populated();
        cache.remove_torrents(&[20]).expect("remove");
        cache.replace_torrents(vec![torrent(10, "alpha"), torrent(20, "beta")], |id| id == 20);
        assert!(cache.torrent(20).is_none());
    }

    #[test]
    fn bulk_priority_reverts_every_entry() {
        let mut cache = populated();
        let before = cache.clone();
        let snapshot = cache
            .set_files_priority(10, &[0, 1, 2], FilePriority::High)
            .expect("priority");
        assert!(
            cache
                .files(10)
                .unwrap()
                .stats()
                .iter()
                .all(|s| s.priority == FilePriority::High)
        );
        cache.restore(snapshot);
        assert_eq!(cache, before);
    }

    #[test]
    fn out_of_range_index_changes_nothing() {
        let mut cache = populated();
        let before = cache.clone();
        let err = cache.set_files_wanted(10, &[0, 3], false).unwrap_err();
        assert_eq!(
            err,
            CoreError::FileIndexOutOfRange {
                torrent_id: 10,
                index: 3,
                len: 3
            }
        );
        assert_eq!(cache, before);
    }

    #[test]
    fn rename_rewrites_file_roots_and_reverts() {
        let mut cache = populated();
        let before = cache.clone();
        let snapshot = cache.rename_torrent(10, "gamma").expect("rename");
        let files = cache.files(10).unwrap();
        assert!(files.files().iter().all(|f| f.name.starts_with("gamma/")));
        assert_eq!(files.len(), files.stats().len());
        cache.restore(snapshot);
        assert_eq!(cache, before);
    }

    #[test]
    fn remove_reinserts_at_original_positions() {
        let mut cache = populated();
        cache.replace_torrents(
            vec![torrent(10, "alpha"), torrent(20, "beta"), torrent(30, "gamma")],
            |_| false,
        );
        cache.store_files(20, files("beta", 2));
        let before = cache.clone();
        let snapshot = cache.remove_torrents(&[30, 10]).expect("remove");
        assert_eq!(cache.torrents().len(), 1);
        cache.restore(snapshot);
        assert_eq!(cache, before);
    }

    #[test]
    fn labels_require_known_ids() {
        let mut cache = populated();
        let before = cache.clone();
        let err = cache
            .set_labels(&[10, 99], &["tv".to_string()])
            .unwrap_err();
        assert_eq!(err, CoreError::UnknownTorrent { torrent_id: 99 });
        assert_eq!(cache, before);
    }

    #[test]
    fn reset_clears_state_and_switches_server() {
        let mut cache = populated();
        cache.set_connection_error(true);
        cache.reset_for_server(None);
        assert!(cache.torrents().is_empty());
        assert!(cache.session_stats().is_none());
        assert!(cache.active_server().is_none());
        assert!(!cache.connection_error());
    }
}
