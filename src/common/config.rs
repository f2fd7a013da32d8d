//! Configuration for the ubiquity server and its backends

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::common::Result;

/// Environment variable prefix (`UBIQUITY_BIND_ADDR`, `UBIQUITY_SCBE__DEFAULT_SERVICE`, ...)
pub const ENV_PREFIX: &str = "UBIQUITY";

/// Default SCBE management port
pub const DEFAULT_SCBE_PORT: u16 = 8440;

/// Group added to the SCBE credentials when none is configured
pub const DEFAULT_SCBE_GROUP: &str = "flocker";

/// Default size (GB) used when neither the request nor the config sets one
pub const DEFAULT_VOLUME_SIZE: &str = "1";

/// Default filesystem type for new SAN volumes
pub const DEFAULT_FILESYSTEM_TYPE: &str = "ext4";

/// Maximum length of the ubiquity instance name
pub const UBIQUITY_INSTANCE_NAME_MAX_SIZE: usize = 15;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// RocksDB path for volume metadata
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Backend used when a create request does not name one
    #[serde(default = "default_backend")]
    pub default_backend: String,

    /// SAN backend, registered only when present
    #[serde(default)]
    pub scbe: Option<ScbeConfig>,

    /// Local-disk backend, registered only when present
    #[serde(default)]
    pub localhost: Option<LocalhostConfig>,

    /// Clustered filesystem section; this server refuses to start with it
    #[serde(default)]
    pub spectrum_scale: Option<serde_json::Value>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9999))
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./ubiquity-data")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_backend() -> String {
    "localhost".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            log_level: default_log_level(),
            default_backend: default_backend(),
            scbe: None,
            localhost: None,
            spectrum_scale: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional TOML file and `UBIQUITY_*` env vars.
    ///
    /// Environment values override file values. Missing fields fall back to
    /// the serde defaults above.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Credentials used to obtain a session token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_group")]
    pub group: String,
}

fn default_group() -> String {
    DEFAULT_SCBE_GROUP.to_string()
}

/// Where and how to reach the SAN controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub credentials: CredentialInfo,

    #[serde(default = "default_scbe_port")]
    pub port: u16,

    #[serde(default)]
    pub management_ip: String,

    /// Accept self-signed controller certificates
    #[serde(default = "default_skip_verify_ssl")]
    pub skip_verify_ssl: bool,
}

fn default_scbe_port() -> u16 {
    DEFAULT_SCBE_PORT
}
fn default_skip_verify_ssl() -> bool {
    true
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            credentials: CredentialInfo::default(),
            port: DEFAULT_SCBE_PORT,
            management_ip: String::new(),
            skip_verify_ssl: true,
        }
    }
}

impl ConnectionInfo {
    /// `https://<ip>:<port>/`, sent as the referer header and used as the URL root
    pub fn referer(&self) -> String {
        format!("https://{}:{}/", self.management_ip, self.port)
    }
}

/// SAN backend configuration
///
/// Empty `default_volume_size` / `default_filesystem_type` mean "not
/// configured"; the backend fills them in during validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScbeConfig {
    #[serde(default)]
    pub connection_info: ConnectionInfo,

    #[serde(default)]
    pub default_service: String,

    #[serde(default)]
    pub default_volume_size: String,

    #[serde(default)]
    pub default_filesystem_type: String,

    #[serde(default)]
    pub ubiquity_instance_name: String,
}

/// Local-disk backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalhostConfig {
    /// Root directory under which volume directories are created
    pub localhost_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.default_backend, "localhost");
        assert!(config.scbe.is_none());
        assert_eq!(ConnectionInfo::default().port, DEFAULT_SCBE_PORT);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
bind_addr = "127.0.0.1:9000"
default_backend = "scbe"

[scbe]
default_service = "gold"
ubiquity_instance_name = "inst1"

[scbe.connection_info]
management_ip = "10.0.0.1"

[scbe.connection_info.credentials]
username = "admin"
password = "secret"

[localhost]
localhost_path = "/tmp/ubiquity"
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.default_backend, "scbe");

        let scbe = config.scbe.unwrap();
        assert_eq!(scbe.default_service, "gold");
        assert_eq!(scbe.connection_info.port, DEFAULT_SCBE_PORT);
        assert_eq!(scbe.connection_info.credentials.group, DEFAULT_SCBE_GROUP);
        assert_eq!(
            scbe.connection_info.referer(),
            "https://10.0.0.1:8440/"
        );
        assert!(scbe.default_volume_size.is_empty());

        assert_eq!(
            config.localhost.unwrap().localhost_path,
            PathBuf::from("/tmp/ubiquity")
        );
    }
}
