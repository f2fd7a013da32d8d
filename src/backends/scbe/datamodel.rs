//! SAN volume records and their persistence

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::common::Result;
use crate::metadata::{MetadataStore, VolumeRecord, VolumeTable};
use crate::resources::{Backend, Volume};

/// A SAN volume as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScbeVolume {
    pub volume: Volume,
    /// Identifier assigned by the controller; never changes after creation
    pub wwn: String,
    /// Host the volume is mapped to, empty when unattached
    pub attach_to: String,
    pub fstype: String,
}

impl ScbeVolume {
    pub fn is_attached(&self) -> bool {
        !self.attach_to.is_empty()
    }
}

impl VolumeRecord for ScbeVolume {
    fn volume(&self) -> &Volume {
        &self.volume
    }
}

/// Persistence contract of the SAN backend.
///
/// `get_volume` returns `Ok(None)` for a missing volume; errors are storage
/// failures only.
pub trait ScbeDataModel: Send + Sync {
    fn create_volume_table(&self) -> Result<()>;

    fn insert_volume(&self, volume: &ScbeVolume) -> Result<()>;

    fn get_volume(&self, name: &str) -> Result<Option<ScbeVolume>>;

    fn list_volumes(&self) -> Result<Vec<ScbeVolume>>;

    fn delete_volume(&self, name: &str) -> Result<()>;

    /// Rewrite only the attachment of `name`
    fn update_volume_attach_to(&self, name: &str, host: &str) -> Result<()>;
}

/// [`ScbeDataModel`] over the metadata store
pub struct ScbeVolumeStore {
    table: VolumeTable<ScbeVolume>,
}

impl ScbeVolumeStore {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self {
            table: VolumeTable::new(store, Backend::Scbe),
        }
    }
}

impl ScbeDataModel for ScbeVolumeStore {
    fn create_volume_table(&self) -> Result<()> {
        self.table.create_table()
    }

    fn insert_volume(&self, volume: &ScbeVolume) -> Result<()> {
        self.table.insert(volume)
    }

    fn get_volume(&self, name: &str) -> Result<Option<ScbeVolume>> {
        self.table.get(name)
    }

    fn list_volumes(&self) -> Result<Vec<ScbeVolume>> {
        self.table.list()
    }

    fn delete_volume(&self, name: &str) -> Result<()> {
        self.table.delete(name)
    }

    fn update_volume_attach_to(&self, name: &str, host: &str) -> Result<()> {
        self.table
            .update(name, |record| record.attach_to = host.to_string())?;
        Ok(())
    }
}
