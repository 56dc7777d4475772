//! Torrent, file, session and server records shared across the workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Daemon-assigned torrent identifier, stable for the torrent's lifetime on one server.
pub type TorrentId = i64;

/// Lifecycle status code reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    /// Torrent is stopped.
    Stopped,
    /// Queued for a local data check.
    CheckWait,
    /// Local data is being checked.
    Checking,
    /// Queued for download.
    DownloadWait,
    /// Downloading.
    Downloading,
    /// Queued for seeding.
    SeedWait,
    /// Seeding.
    Seeding,
}

impl TorrentStatus {
    /// Decode the daemon's numeric status code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Stopped),
            1 => Some(Self::CheckWait),
            2 => Some(Self::Checking),
            3 => Some(Self::DownloadWait),
            4 => Some(Self::Downloading),
            5 => Some(Self::SeedWait),
            6 => Some(Self::Seeding),
            _ => None,
        }
    }

    /// Numeric status code used on the wire.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Stopped => 0,
            Self::CheckWait => 1,
            Self::Checking => 2,
            Self::DownloadWait => 3,
            Self::Downloading => 4,
            Self::SeedWait => 5,
            Self::Seeding => 6,
        }
    }
}

/// Display category derived from the status code and transfer flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Stopped by the user or the daemon.
    Paused,
    /// Waiting for or running a data check.
    Verifying,
    /// Waiting in the download or seed queue.
    Queued,
    /// Downloading but the metadata is still incomplete.
    Metadata,
    /// Downloading with active transfer.
    Downloading,
    /// Downloading but no peer is sending data.
    Stalled,
    /// Seeding.
    Seeding,
}

impl StatusCategory {
    /// Derive the category; a pure function of the three inputs.
    #[must_use]
    pub fn derive(status: TorrentStatus, is_stalled: bool, metadata_percent_complete: f64) -> Self {
        match status {
            TorrentStatus::Stopped => Self::Paused,
            TorrentStatus::CheckWait | TorrentStatus::Checking => Self::Verifying,
            TorrentStatus::DownloadWait | TorrentStatus::SeedWait => Self::Queued,
            TorrentStatus::Downloading if metadata_percent_complete < 1.0 => Self::Metadata,
            TorrentStatus::Downloading if is_stalled => Self::Stalled,
            TorrentStatus::Downloading => Self::Downloading,
            TorrentStatus::Seeding => Self::Seeding,
        }
    }

    /// Stable label for display and filtering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paused => "paused",
            Self::Verifying => "verifying",
            Self::Queued => "queued",
            Self::Metadata => "metadata",
            Self::Downloading => "downloading",
            Self::Stalled => "stalled",
            Self::Seeding => "seeding",
        }
    }
}

/// One torrent as reported by the bulk list call. Immutable per snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Torrent {
    /// Daemon-assigned identifier.
    pub id: TorrentId,
    /// Display name (the root path of the payload).
    pub name: String,
    /// Lifecycle status.
    pub status: TorrentStatus,
    /// Whether the daemon considers the torrent stalled.
    pub is_stalled: bool,
    /// Metadata completeness in the range 0.0–1.0.
    pub metadata_percent_complete: f64,
    /// Completion in the range 0.0–1.0.
    pub percent_done: f64,
    /// Bytes downloaded over the torrent's lifetime.
    pub downloaded_ever: u64,
    /// Bytes uploaded over the torrent's lifetime.
    pub uploaded_ever: u64,
    /// Total payload size in bytes.
    pub total_size: u64,
    /// Bytes of wanted data still missing.
    pub left_until_done: u64,
    /// Download rate in bytes per second.
    pub rate_download: u64,
    /// Upload rate in bytes per second.
    pub rate_upload: u64,
    /// Connected peers.
    pub peers_connected: u32,
    /// Peers we are downloading from.
    pub peers_sending_to_us: u32,
    /// Peers we are uploading to.
    pub peers_getting_from_us: u32,
    /// Seconds until completion, when known.
    pub eta: Option<i64>,
    /// Share ratio.
    pub upload_ratio: f64,
    /// Position in the daemon's queue.
    pub queue_position: i64,
    /// User labels.
    pub labels: Vec<String>,
    /// Time the torrent was added to the daemon.
    pub added_at: Option<DateTime<Utc>>,
    /// Download directory on the daemon host.
    pub download_dir: String,
    /// Daemon error message, empty when healthy.
    pub error_string: String,
}

impl Torrent {
    /// Display category for the torrent.
    #[must_use]
    pub fn category(&self) -> StatusCategory {
        StatusCategory::derive(self.status, self.is_stalled, self.metadata_percent_complete)
    }

    /// Whether every wanted byte is present. A magnet without metadata has
    /// no size yet and is never complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total_size > 0 && self.left_until_done == 0
    }
}

/// Per-file download priority.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Low priority.
    Low,
    /// Normal priority.
    #[default]
    Normal,
    /// High priority.
    High,
}

impl FilePriority {
    /// Decode the daemon's numeric priority; unknown values map to normal.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            c if c < 0 => Self::Low,
            0 => Self::Normal,
            _ => Self::High,
        }
    }

    /// Numeric priority used on the wire.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Low => -1,
            Self::Normal => 0,
            Self::High => 1,
        }
    }
}

/// Static description of one file in a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentFile {
    /// Path relative to the download directory, starting with the torrent name.
    pub name: String,
    /// File size in bytes.
    pub length: u64,
}

/// Mutable per-file state; the unit of file-level optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentFileStats {
    /// Bytes of the file already downloaded.
    pub bytes_completed: u64,
    /// Whether the file is selected for download.
    pub wanted: bool,
    /// Download priority.
    pub priority: FilePriority,
}

/// Positionally aligned file list and file stats for one torrent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFiles {
    files: Vec<TorrentFile>,
    stats: Vec<TorrentFileStats>,
}

impl TorrentFiles {
    /// Pair a file list with its stats.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MisalignedFiles`] when the arrays differ in length.
    pub fn new(files: Vec<TorrentFile>, stats: Vec<TorrentFileStats>) -> CoreResult<Self> {
        if files.len() != stats.len() {
            return Err(CoreError::MisalignedFiles {
                files: files.len(),
                stats: stats.len(),
            });
        }
        Ok(Self { files, stats })
    }

    /// File descriptions in daemon order.
    #[must_use]
    pub fn files(&self) -> &[TorrentFile] {
        &self.files
    }

    /// File stats aligned with [`Self::files`].
    #[must_use]
    pub fn stats(&self) -> &[TorrentFileStats] {
        &self.stats
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the torrent has no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub(crate) fn stats_mut(&mut self) -> &mut [TorrentFileStats] {
        &mut self.stats
    }

    pub(crate) fn files_mut(&mut self) -> &mut [TorrentFile] {
        &mut self.files
    }
}

/// Byte and session counters for one accounting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTotals {
    /// Bytes uploaded.
    pub uploaded_bytes: u64,
    /// Bytes downloaded.
    pub downloaded_bytes: u64,
    /// Files added.
    pub files_added: u64,
    /// Number of daemon sessions.
    pub session_count: u64,
    /// Seconds the daemon was active.
    pub seconds_active: u64,
}

/// Aggregate counts and speeds for the whole daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Torrents currently transferring.
    pub active_torrent_count: u32,
    /// Torrents currently stopped.
    pub paused_torrent_count: u32,
    /// All torrents.
    pub torrent_count: u32,
    /// Aggregate download rate in bytes per second.
    pub download_speed: u64,
    /// Aggregate upload rate in bytes per second.
    pub upload_speed: u64,
    /// Totals across every daemon session.
    pub cumulative: TransferTotals,
    /// Totals for the current daemon session.
    pub current: TransferTotals,
}

/// Daemon-wide settings read through `session-get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Default download directory.
    pub download_dir: String,
    /// Global download cap in KB/s.
    pub speed_limit_down: u64,
    /// Whether the download cap is enforced.
    pub speed_limit_down_enabled: bool,
    /// Global upload cap in KB/s.
    pub speed_limit_up: u64,
    /// Whether the upload cap is enforced.
    pub speed_limit_up_enabled: bool,
    /// Whether alternative ("turtle") limits are active.
    pub alt_speed_enabled: bool,
    /// Alternative download cap in KB/s.
    pub alt_speed_down: u64,
    /// Alternative upload cap in KB/s.
    pub alt_speed_up: u64,
    /// Global peer limit.
    pub peer_limit_global: u32,
    /// Per-torrent peer limit.
    pub peer_limit_per_torrent: u32,
    /// Seed ratio at which torrents stop.
    pub seed_ratio_limit: f64,
    /// Whether the seed ratio limit is enforced.
    pub seed_ratio_limited: bool,
    /// Incoming peer port.
    pub peer_port: u16,
    /// Whether added torrents start immediately.
    pub start_added_torrents: bool,
    /// Maximum concurrently downloading torrents.
    pub download_queue_size: u32,
    /// Whether the download queue is enforced.
    pub download_queue_enabled: bool,
    /// Daemon version string (read-only).
    pub version: String,
    /// RPC protocol version (read-only).
    pub rpc_version: u32,
}

/// URL scheme used to reach the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// Scheme string used in URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Basic-auth credentials for a daemon.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote daemon endpoint; exactly one is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEndpoint {
    /// User-facing profile name; unique within the credential store.
    pub name: String,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// URL scheme.
    pub scheme: Scheme,
    /// RPC path on the host.
    pub rpc_path: String,
    /// Optional basic-auth credentials.
    pub credentials: Option<Credentials>,
}

/// Queue reordering direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMove {
    /// Move to the front of the queue.
    Top,
    /// Move one position forward.
    Up,
    /// Move one position back.
    Down,
    /// Move to the back of the queue.
    Bottom,
}

/// Dispatch-only torrent actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentAction {
    /// Resume, respecting the queue.
    Start,
    /// Resume, bypassing the queue.
    StartNow,
    /// Pause.
    Stop,
    /// Recheck local data.
    Verify,
    /// Announce to trackers now.
    Reannounce,
}

/// Payload source for a new torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AddTorrentSource {
    /// Magnet link or URL the daemon fetches itself.
    Link {
        /// Magnet URI or HTTP(S) URL.
        uri: String,
    },
    /// Raw `.torrent` metainfo bytes.
    Metainfo {
        /// Bencoded metainfo payload.
        bytes: Vec<u8>,
    },
}

/// Request to add one torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTorrent {
    /// Label used in batch summaries (file name or link).
    pub label: String,
    /// Payload source.
    pub source: AddTorrentSource,
    /// Optional download directory override.
    pub download_dir: Option<String>,
    /// Whether to add the torrent stopped.
    pub paused: bool,
}

/// Torrent reported back by an add call (new or duplicate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedTorrent {
    /// Daemon-assigned identifier.
    pub id: TorrentId,
    /// Display name.
    pub name: String,
    /// Info hash.
    pub hash_string: String,
    /// Whether the daemon already had this torrent.
    pub duplicate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip_through_the_daemon_numbering() {
        for code in 0..=6 {
            let status = TorrentStatus::from_code(code).expect("known code");
            assert_eq!(status.code(), code);
        }
        assert!(TorrentStatus::from_code(7).is_none());
        assert!(TorrentStatus::from_code(-1).is_none());
    }

    #[test]
    fn category_prefers_metadata_over_stalled() {
        assert_eq!(
            StatusCategory::derive(TorrentStatus::Downloading, true, 0.5),
            StatusCategory::Metadata
        );
        assert_eq!(
            StatusCategory::derive(TorrentStatus::Downloading, true, 1.0),
            StatusCategory::Stalled
        );
        assert_eq!(
            StatusCategory::derive(TorrentStatus::Downloading, false, 1.0),
            StatusCategory::Downloading
        );
    }

    #[test]
    fn category_maps_waiting_and_checking_states() {
        assert_eq!(
            StatusCategory::derive(TorrentStatus::CheckWait, false, 1.0),
            StatusCategory::Verifying
        );
        assert_eq!(
            StatusCategory::derive(TorrentStatus::SeedWait, false, 1.0),
            StatusCategory::Queued
        );
        assert_eq!(
            StatusCategory::derive(TorrentStatus::Stopped, true, 0.0),
            StatusCategory::Paused
        );
        assert_eq!(
            StatusCategory::derive(TorrentStatus::Seeding, true, 1.0),
            StatusCategory::Seeding
        );
    }

    #[test]
    fn file_priority_codes() {
        assert_eq!(FilePriority::from_code(-1), FilePriority::Low);
        assert_eq!(FilePriority::from_code(0), FilePriority::Normal);
        assert_eq!(FilePriority::from_code(1), FilePriority::High);
        assert_eq!(FilePriority::High.code(), 1);
        assert_eq!(FilePriority::Low.code(), -1);
    }

    #[test]
    fn torrent_files_reject_misaligned_arrays() {
        let files = vec![TorrentFile {
            name: "a/b".into(),
            length: 1,
        }];
        let err = TorrentFiles::new(files, Vec::new()).unwrap_err();
        assert_eq!(err, CoreError::MisalignedFiles { files: 1, stats: 0 });
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
