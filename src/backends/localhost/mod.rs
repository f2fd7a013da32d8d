//! Local-disk fallback backend
//!
//! Each volume is a directory under the configured root. Attaching returns
//! that directory; there is no remote state.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::common::{Error, LocalhostConfig, Result};
use crate::metadata::{MetadataStore, VolumeTable};
use crate::resources::{Backend, StorageClient, Volume, VolumeConfig, VolumeMetadata};

pub struct LocalhostClient {
    table: VolumeTable<Volume>,
    root: PathBuf,
    activated: RwLock<bool>,
}

impl LocalhostClient {
    pub fn new(config: &LocalhostConfig, store: Arc<MetadataStore>) -> Result<Self> {
        let table = VolumeTable::new(store, Backend::Localhost);
        table.create_table()?;
        Ok(Self {
            table,
            root: config.localhost_path.clone(),
            activated: RwLock::new(false),
        })
    }

    /// Directory of a volume. The name must be a single plain path component
    /// so the result always stays under the root.
    fn volume_path(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => Ok(self.root.join(name)),
            _ => Err(Error::InvalidRequest {
                request: "volume".into(),
                field: "Name".into(),
                value: name.to_string(),
                expected: "a single directory name".into(),
            }),
        }
    }

    fn existing_volume(&self, name: &str) -> Result<Volume> {
        self.table
            .get(name)?
            .ok_or_else(|| Error::VolumeNotFound(name.to_string()))
    }
}

#[async_trait]
impl StorageClient for LocalhostClient {
    fn backend(&self) -> Backend {
        Backend::Localhost
    }

    async fn activate(&self) -> Result<()> {
        if *self.activated.read().await {
            return Ok(());
        }
        let mut activated = self.activated.write().await;
        if *activated {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.root).await?;
        *activated = true;
        tracing::info!(root = %self.root.display(), "Local-disk backend activated");
        Ok(())
    }

    /// Creating an existing volume returns the stored record unchanged
    async fn create_volume(
        &self,
        name: &str,
        capacity_bytes: u64,
        metadata: &VolumeMetadata,
    ) -> Result<Volume> {
        let path = self.volume_path(name)?;
        if let Some(existing) = self.table.get(name)? {
            tracing::debug!(volume = %name, "Volume already exists, returning it");
            return Ok(existing);
        }

        tracing::debug!(volume = %name, options = ?metadata, "Creating volume");
        tokio::fs::create_dir_all(&path).await?;

        let volume = Volume::new(name, Backend::Localhost, capacity_bytes, metadata.clone());
        self.table.insert(&volume)?;
        tracing::info!(volume = %name, "Volume created");
        Ok(volume)
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        let path = self.volume_path(name)?;
        self.existing_volume(name)?;

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.table.delete(name)?;
        tracing::info!(volume = %name, "Volume removed");
        Ok(())
    }

    async fn attach(&self, name: &str, host: &str) -> Result<String> {
        let path = self.volume_path(name)?;
        self.existing_volume(name)?;
        let mountpoint = path.display().to_string();
        self.table
            .update(name, |volume| volume.mountpoint = Some(mountpoint.clone()))?;
        tracing::info!(volume = %name, host = %host, mountpoint = %mountpoint, "Volume attached");
        Ok(mountpoint)
    }

    async fn detach(&self, name: &str, host: &str) -> Result<()> {
        self.existing_volume(name)?;
        self.table.update(name, |volume| volume.mountpoint = None)?;
        tracing::info!(volume = %name, host = %host, "Volume detached");
        Ok(())
    }

    async fn get_volume(&self, name: &str) -> Result<Volume> {
        self.existing_volume(name)
    }

    async fn get_volume_config(&self, name: &str) -> Result<VolumeConfig> {
        let existing = self.existing_volume(name)?;
        let mut config = VolumeConfig::new();
        config.insert(
            "mountpoint".to_string(),
            existing
                .mountpoint
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        );
        Ok(config)
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>> {
        self.table.list()
    }
}
