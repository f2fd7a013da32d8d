//! Backend-agnostic volume model and the contract every backend implements

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::common::{Error, Result};
use crate::ops::verify::AttachmentMismatch;

/// Free-form creation options, kept in key order
pub type VolumeMetadata = BTreeMap<String, String>;

/// Volume configuration returned by `GetVolumeConfig`
pub type VolumeConfig = serde_json::Map<String, serde_json::Value>;

/// Option naming the filesystem a block volume is formatted with
pub const OPTION_NAME_FOR_VOLUME_FS_TYPE: &str = "fstype";

/// Storage backends a volume can live on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Backend {
    /// Block storage SAN controller
    #[serde(rename = "scbe")]
    Scbe,
    /// Clustered filesystem
    #[serde(rename = "spectrum-scale")]
    SpectrumScale,
    /// Local-disk fallback
    #[serde(rename = "localhost")]
    Localhost,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Scbe, Backend::SpectrumScale, Backend::Localhost];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Scbe => "scbe",
            Backend::SpectrumScale => "spectrum-scale",
            Backend::Localhost => "localhost",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Backend::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| Error::UnknownBackend(s.to_string()))
    }
}

/// A volume as seen by API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub backend: Backend,
    #[serde(default)]
    pub capacity_bytes: u64,
    #[serde(default)]
    pub metadata: VolumeMetadata,
    #[serde(default)]
    pub mountpoint: Option<String>,
}

impl Volume {
    pub fn new(name: &str, backend: Backend, capacity_bytes: u64, metadata: VolumeMetadata) -> Self {
        Self {
            name: name.to_string(),
            backend,
            capacity_bytes,
            metadata,
            mountpoint: None,
        }
    }
}

// === Requests ===

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    #[serde(default)]
    pub backends: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeRequest {
    pub name: String,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub capacity_bytes: u64,
    #[serde(default)]
    pub metadata: VolumeMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveVolumeRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachRequest {
    pub name: String,
    #[serde(default)]
    pub host: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetachRequest {
    pub name: String,
    #[serde(default)]
    pub host: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetVolumeRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetVolumeConfigRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListVolumesRequest {
    #[serde(default)]
    pub backends: Vec<String>,
}

// === Responses ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVolumeResponse {
    pub volume: Volume,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachResponse {
    pub mountpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetVolumeResponse {
    pub volume: Volume,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVolumeConfigResponse {
    pub volume_config: VolumeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListVolumesResponse {
    pub volumes: Vec<Volume>,
}

/// Error body for every non-200 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericResponse {
    pub err: String,
}

/// The capability contract shared by all backends.
///
/// The router is written against this trait only. Implementations return
/// domain errors as values; the caller is responsible for holding the
/// per-volume lock around mutating calls.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Which backend this client serves
    fn backend(&self) -> Backend;

    async fn activate(&self) -> Result<()>;

    async fn create_volume(
        &self,
        name: &str,
        capacity_bytes: u64,
        metadata: &VolumeMetadata,
    ) -> Result<Volume>;

    async fn remove_volume(&self, name: &str) -> Result<()>;

    /// Attach `name` to `host` and return the mountpoint
    async fn attach(&self, name: &str, host: &str) -> Result<String>;

    async fn detach(&self, name: &str, host: &str) -> Result<()>;

    async fn get_volume(&self, name: &str) -> Result<Volume>;

    async fn get_volume_config(&self, name: &str) -> Result<VolumeConfig>;

    async fn list_volumes(&self) -> Result<Vec<Volume>>;

    /// Compare local attachment state with the backend's view.
    ///
    /// Only reports; nothing is repaired.
    async fn verify(&self) -> Result<Vec<AttachmentMismatch>> {
        Ok(Vec::new())
    }
}
