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

//! JSON-over-HTTP client for the Transmission daemon RPC protocol.
//!
//! Layout:
//! - `wire.rs`: request/response envelopes and the wire field translation tables
//! - `client.rs`: HTTP transport, session-token handshake, status mapping
//! - `service.rs`: the `TransmissionRpc` seam and the per-server connector
//! - `error.rs`: transport/protocol errors and their collapse into outcomes

pub mod client;
pub mod error;
pub mod service;
pub(crate) mod wire;

pub use client::{DEFAULT_RPC_PATH, HttpTransmissionClient, SESSION_ID_HEADER, endpoint_url};
pub use error::{RpcError, RpcResult};
pub use service::{HttpConnector, RpcConnector, TransmissionRpc};
pub use tether_core::TransmissionResponse;
