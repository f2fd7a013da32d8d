//! # ubiquity
//!
//! A storage orchestration daemon that exposes one volume API over several
//! storage backends:
//! - A SAN block storage controller, driven over its REST API
//! - A local-disk fallback, one directory per volume
//!
//! Volume metadata (which backend owns a volume, attachment state) lives in
//! RocksDB and survives restarts. Mutating operations are serialized per
//! volume name inside the process.
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!            HTTP (JSON)
//!                │
//!      ┌─────────▼──────────┐     ┌────────────────────┐
//!      │   Request router   │────▶│  Per-volume locks  │
//!      └─────────┬──────────┘     └────────────────────┘
//!                │ StorageClient
//!      ┌─────────┴──────────────┐
//!      │                        │
//! ┌────▼────────────┐   ┌───────▼────────┐
//! │ SAN backend     │   │ Local disk     │
//! │  + REST client ─┼─▶ │                │
//! │   (controller)  │   │                │
//! └────┬────────────┘   └───────┬────────┘
//!      │                        │
//! ┌────▼────────────────────────▼────────┐
//! │  Metadata store (RocksDB)            │
//! │  name → backend index, one CF/backend│
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! ubiquity-server serve --config ./ubiquity.toml --bind 0.0.0.0:9999
//!
//! curl -X POST localhost:9999/volumes \
//!   -d '{"name":"vol1","backend":"scbe","metadata":{"size":"5","fstype":"xfs"}}'
//! curl -X POST localhost:9999/volumes/attach -d '{"name":"vol1","host":"node1"}'
//! ```

pub mod backends;
pub mod common;
pub mod metadata;
pub mod ops;
pub mod resources;
pub mod server;

// Re-export commonly used types
pub use common::{Error, Result, ServerConfig};
pub use resources::{Backend, StorageClient, Volume};
pub use server::Server;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
