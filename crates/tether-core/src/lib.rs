#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Daemon-agnostic domain types and the in-memory session cache.
//!
//! Layout: `model/` (torrent, file, session and server records), `cache.rs`
//! (the session cache with merge, snapshot and restore primitives),
//! `changeset.rs` (sparse mutation payloads), `validate.rs` (local input
//! checks), `view.rs` (sort/filter projections), `batch.rs` (batch failure
//! summaries), `outcome.rs` (the four-valued call outcome).

pub mod batch;
pub mod cache;
pub mod changeset;
pub mod error;
pub mod model;
pub mod outcome;
pub mod validate;
pub mod view;

pub use batch::{BatchSummary, DEFAULT_BATCH_DETAIL_LIMIT};
pub use cache::{CacheSnapshot, SessionCache};
pub use changeset::{BandwidthLimits, SessionSettingsChangeset, TorrentChangeset};
pub use error::{CoreError, CoreResult};
pub use model::{
    AddTorrent, AddTorrentSource, AddedTorrent, Credentials, FilePriority, QueueMove, Scheme,
    ServerEndpoint, SessionSettings, SessionStats, StatusCategory, Torrent, TorrentAction,
    TorrentFile, TorrentFileStats, TorrentFiles, TorrentId, TorrentStatus, TransferTotals,
};
pub use outcome::TransmissionResponse;
pub use validate::validate_rename;
pub use view::{SortKey, TorrentQuery};
