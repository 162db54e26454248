//! harhar: record, replay, transform and diff HTTP traffic archives (HAR).
//!
//! # Module Structure
//!
//! - `har` - archive model and file I/O
//! - `name_value` - helpers over ordered name/value lists
//! - `config` - option structs for every command
//! - `fingerprint` - request fingerprints and the replay index
//! - `transform` - entry rewriting (filters, sorting, URL and multipart rewrites)
//! - `conversion` - translation between hyper messages and archive entries
//! - `lifecycle` - listener, connection tracking and graceful drain
//! - `proxy` - recording forwarding proxy
//! - `replay` - replay server
//! - `client_replay` - replay of archived requests against a live server
//! - `diff` - archive comparison by request id

pub mod client_replay;
pub mod config;
pub mod conversion;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod har;
pub mod lifecycle;
pub mod name_value;
pub mod proxy;
pub mod recorder;
pub mod replay;
pub mod transform;

pub use client_replay::client_replay;
pub use config::{MatchPolicy, ProxyConfig, TransformOptions};
pub use diff::{diff_archives, EntryDiff};
pub use error::{HarError, Result, TransportError};
pub use har::{read_archive, write_archive, Archive, Entry};
pub use lifecycle::Lifecycle;
pub use proxy::run_proxy_server;
pub use replay::{run_replay_server, Replayer};
pub use transform::transform_archive;
