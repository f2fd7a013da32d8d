//! Common utilities and types shared across ubiquity

pub mod config;
pub mod error;
pub mod locker;
pub mod tracing_middleware;
pub mod utils;

pub use config::{
    ConnectionInfo, CredentialInfo, LocalhostConfig, ScbeConfig, ServerConfig,
};
pub use error::{Error, Result};
pub use locker::Locker;
pub use utils::{encode_segment, format_url, string_in_slice};
