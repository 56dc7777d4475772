//! Dispatch sequence numbers.
//!
//! Every daemon call takes the next number from one monotonic counter.
//! Optimistic mutations stamp the entities they touch with their number; a
//! read dispatched earlier than the stamp is older than the mutation and must
//! not overwrite it.

use std::collections::HashMap;

use tether_core::TorrentId;

pub(crate) type Seq = u64;

#[derive(Debug, Default)]
pub(crate) struct DispatchMarks {
    last: Seq,
    applied_list: Seq,
    torrents: HashMap<TorrentId, Seq>,
    files: HashMap<TorrentId, Seq>,
    settings: Seq,
}

impl DispatchMarks {
    pub(crate) const fn next(&mut self) -> Seq {
        self.last += 1;
        self.last
    }

    pub(crate) fn mark_torrents(&mut self, ids: &[TorrentId], seq: Seq) {
        for &id in ids {
            self.torrents.insert(id, seq);
        }
    }

    pub(crate) fn mark_files(&mut self, id: TorrentId, seq: Seq) {
        self.files.insert(id, seq);
    }

    pub(crate) const fn mark_settings(&mut self, seq: Seq) {
        self.settings = seq;
    }

    /// Whether a list response dispatched at `seq` predates one already applied.
    pub(crate) const fn list_is_outdated(&self, seq: Seq) -> bool {
        seq < self.applied_list
    }

    /// Whether the cached record of `id` is newer than a read dispatched at `seq`.
    pub(crate) fn torrent_is_newer(&self, id: TorrentId, seq: Seq) -> bool {
        self.torrents.get(&id).is_some_and(|&mark| mark > seq)
    }

    pub(crate) fn files_are_newer(&self, id: TorrentId, seq: Seq) -> bool {
        self.files.get(&id).is_some_and(|&mark| mark > seq)
    }

    pub(crate) const fn settings_are_newer(&self, seq: Seq) -> bool {
        self.settings > seq
    }

    /// Record an applied list response and drop the marks it supersedes.
    pub(crate) fn list_applied(&mut self, seq: Seq) {
        self.applied_list = seq;
        self.torrents.retain(|_, mark| *mark > seq);
    }

    pub(crate) fn files_applied(&mut self, id: TorrentId, seq: Seq) {
        if self.files.get(&id).is_some_and(|&mark| mark <= seq) {
            self.files.remove(&id);
        }
    }

    /// Forget per-entity marks; the counter keeps increasing.
    pub(crate) fn reset(&mut self) {
        self.applied_list = 0;
        self.torrents.clear();
        self.files.clear();
        self.settings = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_reads_lose_to_newer_marks() {
        let mut marks = DispatchMarks::default();
        let poll = marks.next();
        let mutation = marks.next();
        marks.mark_torrents(&[10], mutation);

        assert!(marks.torrent_is_newer(10, poll));
        assert!(!marks.torrent_is_newer(20, poll));

        let later_poll = marks.next();
        assert!(!marks.torrent_is_newer(10, later_poll));
        marks.list_applied(later_poll);
        assert!(!marks.torrent_is_newer(10, poll));
        assert!(marks.list_is_outdated(poll));
    }

    #[test]
    fn reset_keeps_counter_monotonic() {
        let mut marks = DispatchMarks::default();
        let first = marks.next();
        marks.mark_files(1, first);
        marks.mark_settings(first);
        marks.reset();
        assert!(marks.next() > first);
        assert!(!marks.files_are_newer(1, 0));
        assert!(!marks.settings_are_newer(0));
    }
}
