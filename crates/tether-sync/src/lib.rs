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
#![allow(clippy::redundant_pub_crate)]

//! Sync engine and mutation reconciler for one Transmission daemon at a time.
//!
//! A single worker task owns the [`SessionCache`](tether_core::SessionCache).
//! Poll ticks and mutations dispatch daemon calls on spawned tasks whose
//! results are funnelled back to the worker before anything touches the
//! cache, so there is exactly one writer.
//!
//! Layout:
//! - `handle.rs`: `SessionHandle`, the cloneable facade callers hold
//! - `command.rs`: commands sent to the worker and completions sent back
//! - `worker.rs`: the owning task (poll loop, merge, optimistic apply, revert)
//! - `mutation.rs`: mutation kinds and how each maps onto cache and daemon calls
//! - `marks.rs`: dispatch sequence numbers guarding optimistic state from stale reads
//! - `auth.rs`: consecutive-unauthorized tracking for the connection-error flag
//! - `error.rs`: local failures that never reach the daemon

mod auth;
mod command;
pub mod error;
pub mod handle;
mod marks;
pub mod mutation;
mod worker;

pub use error::{SyncError, SyncResult};
pub use handle::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, SessionHandle, clamp_interval};
pub use mutation::Mutation;
