//! Per-backend volume tables
//!
//! A `VolumeTable<R>` stores backend-specific records `R` (each embedding the
//! generic `Volume`) in the backend's namespace and keeps the global
//! name → backend index in step with it.

use crate::common::{Error, Result};
use crate::metadata::MetadataStore;
use crate::resources::{Backend, Volume};
use rocksdb::WriteBatch;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// A record stored in a backend namespace
pub trait VolumeRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// The generic view of this record
    fn volume(&self) -> &Volume;

    fn name(&self) -> &str {
        &self.volume().name
    }
}

impl VolumeRecord for Volume {
    fn volume(&self) -> &Volume {
        self
    }
}

/// Records of one backend
pub struct VolumeTable<R> {
    store: Arc<MetadataStore>,
    backend: Backend,
    _record: PhantomData<fn() -> R>,
}

impl<R: VolumeRecord> VolumeTable<R> {
    pub fn new(store: Arc<MetadataStore>, backend: Backend) -> Self {
        Self {
            store,
            backend,
            _record: PhantomData,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Idempotent schema initialization
    pub fn create_table(&self) -> Result<()> {
        self.store.create_namespace(self.backend)
    }

    /// Persist a new record. Fails if the name is already taken.
    pub fn insert(&self, record: &R) -> Result<()> {
        let name = record.name();
        if let Some(owner) = self.store.get_backend_for_volume(name)? {
            return Err(Error::DuplicateKey {
                name: name.to_string(),
                backend: owner.to_string(),
            });
        }

        let value = encode(record)?;
        let cf = self.store.cf(self.backend.as_str())?;
        let index = self.store.index_cf()?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf, name.as_bytes(), value);
        batch.put_cf(&index, name.as_bytes(), self.backend.as_str().as_bytes());
        self.store.db().write(batch)?;
        Ok(())
    }

    /// `Ok(None)` is the canonical "does not exist" answer
    pub fn get(&self, name: &str) -> Result<Option<R>> {
        let cf = self.store.cf(self.backend.as_str())?;
        match self.store.db().get_cf(&cf, name.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All records of this backend
    pub fn list(&self) -> Result<Vec<R>> {
        let cf = self.store.cf(self.backend.as_str())?;
        let iter = self
            .store
            .db()
            .iterator_cf(&cf, rocksdb::IteratorMode::Start);

        let mut records = Vec::new();
        for item in iter {
            let (_, value_bytes) = item?;
            records.push(decode(&value_bytes)?);
        }
        Ok(records)
    }

    /// Delete a record and its index entry. Fails if the record is missing.
    pub fn delete(&self, name: &str) -> Result<()> {
        if self.get(name)?.is_none() {
            return Err(Error::RecordNotFound(name.to_string()));
        }

        let cf = self.store.cf(self.backend.as_str())?;
        let index = self.store.index_cf()?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf, name.as_bytes());
        batch.delete_cf(&index, name.as_bytes());
        self.store.db().write(batch)?;
        Ok(())
    }

    /// Read, modify and write back a single record
    pub fn update<F>(&self, name: &str, apply: F) -> Result<R>
    where
        F: FnOnce(&mut R),
    {
        let mut record = self
            .get(name)?
            .ok_or_else(|| Error::RecordNotFound(name.to_string()))?;
        apply(&mut record);

        let cf = self.store.cf(self.backend.as_str())?;
        self.store
            .db()
            .put_cf(&cf, name.as_bytes(), encode(&record)?)?;
        Ok(record)
    }
}

fn encode<R: Serialize>(record: &R) -> Result<Vec<u8>> {
    bincode::serialize(record).map_err(|e| Error::Internal(format!("Serialize error: {}", e)))
}

fn decode<R: DeserializeOwned>(bytes: &[u8]) -> Result<R> {
    bincode::deserialize(bytes).map_err(|e| Error::MetadataCorrupted(e.to_string()))
}
