//! Sorted and filtered projections over the session cache.
//!
//! Views borrow from the cache and never reorder or mutate it; the stored
//! order is always the order of the last applied list response.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cache::SessionCache;
use crate::model::{StatusCategory, Torrent};

/// Column a view is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Case-insensitive name.
    #[default]
    Name,
    /// Completion ratio.
    Progress,
    /// Time added.
    AddedAt,
    /// Daemon queue position.
    QueuePosition,
    /// Download rate.
    DownloadRate,
    /// Upload rate.
    UploadRate,
}

/// Sort and filter parameters for a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentQuery {
    /// Sort column.
    pub sort: SortKey,
    /// Reverse the sort order.
    pub descending: bool,
    /// Restrict to one status category.
    pub category: Option<StatusCategory>,
    /// Case-insensitive substring match on the name.
    pub search: Option<String>,
}

impl TorrentQuery {
    fn matches(&self, torrent: &Torrent, needle: Option<&str>) -> bool {
        if let Some(category) = self.category
            && torrent.category() != category
        {
            return false;
        }
        needle.is_none_or(|needle| torrent.name.to_lowercase().contains(needle))
    }
}

fn compare(key: SortKey, left: &Torrent, right: &Torrent) -> Ordering {
    let primary = match key {
        SortKey::Name => left.name.to_lowercase().cmp(&right.name.to_lowercase()),
        SortKey::Progress => left.percent_done.total_cmp(&right.percent_done),
        SortKey::AddedAt => left.added_at.cmp(&right.added_at),
        SortKey::QueuePosition => left.queue_position.cmp(&right.queue_position),
        SortKey::DownloadRate => left.rate_download.cmp(&right.rate_download),
        SortKey::UploadRate => left.rate_upload.cmp(&right.rate_upload),
    };
    primary.then_with(|| left.id.cmp(&right.id))
}

impl SessionCache {
    /// Borrow the torrents matching `query`, in the requested order.
    #[must_use]
    pub fn view(&self, query: &TorrentQuery) -> Vec<&Torrent> {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);
        let mut rows: Vec<&Torrent> = self
            .torrents()
            .iter()
            .filter(|torrent| query.matches(torrent, needle.as_deref()))
            .collect();
        rows.sort_by(|left, right| {
            let ordering = compare(query.sort, left, right);
            if query.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TorrentStatus;

    fn torrent(id: i64, name: &str, status: TorrentStatus, percent_done: f64) -> Torrent {
        Torrent {
            id,
            name: name.into(),
            status,
            is_stalled: false,
            metadata_percent_complete: 1.0,
            percent_done,
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
        cache.replace_torrents(
            vec![
                torrent(20, "zeta", TorrentStatus::Stopped, 0.2),
                torrent(10, "Alpha", TorrentStatus::Downloading, 0.9),
                torrent(30, "beta", TorrentStatus::Downloading, 0.5),
            ],
            |_| false,
        );
        cache
    }

    #[test]
    fn view_sorts_without_touching_cache_order() {
        let cache = cache();
        let names: Vec<_> = cache
            .view(&TorrentQuery::default())
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, ["Alpha", "beta", "zeta"]);
        let stored: Vec<_> = cache.torrents().iter().map(|t| t.id).collect();
        assert_eq!(stored, [20, 10, 30]);
    }

    #[test]
    fn view_filters_by_category_and_search() {
        let cache = cache();
        let query = TorrentQuery {
            sort: SortKey::Progress,
            descending: true,
            category: Some(StatusCategory::Downloading),
            search: Some(" A ".into()),
        };
        let ids: Vec<_> = cache.view(&query).iter().map(|t| t.id).collect();
        assert_eq!(ids, [10, 30]);
    }
}
