//! Volume metadata store using RocksDB
//!
//! Stores:
//! - A global index of volume name → owning backend, used by the router
//! - One namespace (column family) per backend holding that backend's records
//!
//! The store does not serialize concurrent writers. Callers hold the
//! per-volume lock around read-modify-write sequences.

pub mod table;

pub use table::{VolumeRecord, VolumeTable};

use crate::common::{Error, Result};
use crate::resources::Backend;
use rocksdb::{BoundColumnFamily, DBWithThreadMode, MultiThreaded, Options};
use std::path::Path;
use std::sync::Arc;

type Db = DBWithThreadMode<MultiThreaded>;

const CF_VOLUMES: &str = "volumes";

/// Metadata store
pub struct MetadataStore {
    db: Db,
}

impl MetadataStore {
    /// Open or create metadata store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // Every existing column family must be opened, including backend
        // namespaces created by earlier runs.
        let mut cfs = Db::list_cf(&opts, path.as_ref()).unwrap_or_default();
        if !cfs.iter().any(|cf| cf == CF_VOLUMES) {
            cfs.push(CF_VOLUMES.to_string());
        }

        let db = Db::open_cf(&opts, path, cfs)?;

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::MetadataCorrupted(format!("missing column family {}", name)))
    }

    pub(crate) fn index_cf(&self) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.cf(CF_VOLUMES)
    }

    /// Create the namespace for `backend` if it does not exist yet
    pub fn create_namespace(&self, backend: Backend) -> Result<()> {
        if self.db.cf_handle(backend.as_str()).is_some() {
            return Ok(());
        }
        self.db.create_cf(backend.as_str(), &Options::default())?;
        tracing::debug!(backend = %backend, "Created metadata namespace");
        Ok(())
    }

    /// Which backend owns `name`, if any
    pub fn get_backend_for_volume(&self, name: &str) -> Result<Option<Backend>> {
        let cf = self.index_cf()?;
        match self.db.get_cf(&cf, name.as_bytes())? {
            Some(bytes) => {
                let backend = std::str::from_utf8(&bytes)
                    .map_err(|_| Error::MetadataCorrupted("Invalid UTF-8".into()))?;
                let backend = backend.parse::<Backend>().map_err(|_| {
                    Error::MetadataCorrupted(format!("unknown backend {} for {}", backend, name))
                })?;
                Ok(Some(backend))
            }
            None => Ok(None),
        }
    }

    /// Does a volume with this name exist in any backend?
    pub fn volume_exists(&self, name: &str) -> Result<bool> {
        Ok(self.get_backend_for_volume(name)?.is_some())
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
