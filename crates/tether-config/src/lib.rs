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

//! File-backed client configuration and server profile store.
//!
//! Layout: `model.rs` (config document and server profiles), `defaults.rs`
//! (fallback values), `validate.rs` (document validation), `store.rs`
//! (`ServerStore` trait and its JSON file implementation), `error.rs`.

pub mod defaults;
pub mod error;
pub mod model;
pub mod store;
pub mod validate;

pub use defaults::{
    CONFIG_FILE_NAME, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS,
    default_config_path,
};
pub use error::{ConfigError, ConfigResult};
pub use model::{ClientConfig, LogFormatSetting, ServerProfile};
pub use store::{JsonServerStore, ServerStore};
pub use validate::validate_profile;
