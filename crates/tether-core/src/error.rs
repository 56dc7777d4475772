//! Error types for session cache operations.

use thiserror::Error;

use crate::model::TorrentId;

/// Primary error type for local (pre-network) cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Torrent was not present in the session cache.
    #[error("torrent not found in session cache")]
    UnknownTorrent {
        /// Missing torrent identifier.
        torrent_id: TorrentId,
    },
    /// File list for the torrent has not been fetched yet.
    #[error("file list not loaded")]
    FilesNotLoaded {
        /// Torrent whose file list is missing.
        torrent_id: TorrentId,
    },
    /// A file index did not refer to a file of the torrent.
    #[error("file index out of range")]
    FileIndexOutOfRange {
        /// Torrent the index was resolved against.
        torrent_id: TorrentId,
        /// Offending index.
        index: usize,
        /// Number of files known for the torrent.
        len: usize,
    },
    /// File and file-stat arrays had different lengths.
    #[error("file list and file stats are misaligned")]
    MisalignedFiles {
        /// Number of file entries.
        files: usize,
        /// Number of file-stat entries.
        stats: usize,
    },
    /// A rename target failed local validation.
    #[error("invalid torrent name")]
    InvalidName {
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
    /// A mutation named no targets.
    #[error("mutation has no targets")]
    EmptySelection,
}

/// Convenience alias for cache operation results.
pub type CoreResult<T> = Result<T, CoreError>;
