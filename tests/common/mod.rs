//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use ubiquity::backends::scbe::{
    ScbeDataModel, ScbeResponseMapping, ScbeResponseVolume, ScbeRestClient, ScbeVolume,
    ScbeVolumeInfo, ScbeVolumeStore,
};
use ubiquity::common::{Error, Result, ScbeConfig};
use ubiquity::metadata::MetadataStore;

pub fn open_store(dir: &TempDir) -> Arc<MetadataStore> {
    Arc::new(MetadataStore::open(dir.path().join("meta.db")).unwrap())
}

pub fn scbe_config() -> ScbeConfig {
    ScbeConfig {
        default_service: "gold".into(),
        ubiquity_instance_name: "abc".into(),
        ..Default::default()
    }
}

/// Controller double that records every call
#[derive(Default)]
pub struct FakeScbeRestClient {
    pub login_calls: AtomicUsize,
    pub service_exist_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub map_calls: AtomicUsize,
    pub unmap_calls: AtomicUsize,
    pub get_volumes_calls: AtomicUsize,

    /// Error messages returned by the matching call when set
    pub login_error: Mutex<Option<String>>,
    pub create_error: Mutex<Option<String>>,
    pub delete_error: Mutex<Option<String>>,
    pub map_error: Mutex<Option<String>>,
    pub unmap_error: Mutex<Option<String>>,

    /// How long each map call stays on the controller
    pub map_delay_ms: AtomicU64,
    pub maps_in_flight: AtomicUsize,
    /// Most map calls ever seen running at once
    pub max_maps_in_flight: AtomicUsize,

    pub service_missing: AtomicBool,
    /// How many controller volumes `get_volumes` reports for a wwn
    pub volumes_per_wwn: Mutex<Option<usize>>,

    /// (composed name, service, size) of each create
    pub created: Mutex<Vec<(String, String, i64)>>,
    /// wwn → host, as the controller sees it
    pub mappings: Mutex<HashMap<String, String>>,
}

impl FakeScbeRestClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(slot: &Mutex<Option<String>>, message: &str) {
        *slot.lock().unwrap() = Some(message.to_string());
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn check(slot: &Mutex<Option<String>>) -> Result<()> {
        match slot.lock().unwrap().clone() {
            Some(message) => Err(Error::Other(message)),
            None => Ok(()),
        }
    }
}

pub fn wwn_for(composed: &str) -> String {
    format!("WWN-{}", composed)
}

#[async_trait]
impl ScbeRestClient for FakeScbeRestClient {
    async fn login(&self) -> Result<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.login_error)
    }

    async fn create_volume(
        &self,
        vol_name: &str,
        service_name: &str,
        size: i64,
    ) -> Result<ScbeVolumeInfo> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.create_error)?;
        self.created
            .lock()
            .unwrap()
            .push((vol_name.to_string(), service_name.to_string(), size));
        Ok(ScbeVolumeInfo {
            name: vol_name.to_string(),
            wwn: wwn_for(vol_name),
            service_name: service_name.to_string(),
        })
    }

    async fn get_volumes(&self, wwn: &str) -> Result<Vec<ScbeResponseVolume>> {
        self.get_volumes_calls.fetch_add(1, Ordering::SeqCst);
        let count = self.volumes_per_wwn.lock().unwrap().unwrap_or(1);
        Ok((0..count)
            .map(|i| ScbeResponseVolume {
                id: format!("id-{}", i),
                scsi_identifier: wwn.to_string(),
                array: "array1".into(),
                pool_name: "pool1".into(),
                service_name: "gold".into(),
                capacity: 1073741824,
                ..Default::default()
            })
            .collect())
    }

    async fn delete_volume(&self, _wwn: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.delete_error)
    }

    async fn map_volume(&self, wwn: &str, host: &str) -> Result<ScbeResponseMapping> {
        self.map_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.map_error)?;

        let running = self.maps_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_maps_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = self.map_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.maps_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.mappings
            .lock()
            .unwrap()
            .insert(wwn.to_string(), host.to_string());
        Ok(ScbeResponseMapping {
            id: 1,
            volume: wwn.to_string(),
            host: 7,
            lun_number: 1,
            array: "array1".into(),
        })
    }

    async fn unmap_volume(&self, wwn: &str, _host: &str) -> Result<()> {
        self.unmap_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.unmap_error)?;
        self.mappings.lock().unwrap().remove(wwn);
        Ok(())
    }

    async fn get_vol_mapping(&self, wwn: &str) -> Result<String> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .get(wwn)
            .cloned()
            .unwrap_or_default())
    }

    async fn service_exist(&self, _service_name: &str) -> Result<bool> {
        self.service_exist_calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self.service_missing.load(Ordering::SeqCst))
    }
}

/// Real store whose writes can be made to fail
pub struct FailingDataModel {
    inner: ScbeVolumeStore,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_update: AtomicBool,
}

impl FailingDataModel {
    pub fn new(store: Arc<MetadataStore>) -> Arc<Self> {
        let inner = ScbeVolumeStore::new(store);
        inner.create_volume_table().unwrap();
        Arc::new(Self {
            inner,
            fail_insert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
        })
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(Error::Other(format!("{} failed", op)));
        }
        Ok(())
    }
}

impl ScbeDataModel for FailingDataModel {
    fn create_volume_table(&self) -> Result<()> {
        self.inner.create_volume_table()
    }

    fn insert_volume(&self, volume: &ScbeVolume) -> Result<()> {
        Self::check(&self.fail_insert, "insert")?;
        self.inner.insert_volume(volume)
    }

    fn get_volume(&self, name: &str) -> Result<Option<ScbeVolume>> {
        self.inner.get_volume(name)
    }

    fn list_volumes(&self) -> Result<Vec<ScbeVolume>> {
        self.inner.list_volumes()
    }

    fn delete_volume(&self, name: &str) -> Result<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete_volume(name)
    }

    fn update_volume_attach_to(&self, name: &str, host: &str) -> Result<()> {
        Self::check(&self.fail_update, "update")?;
        self.inner.update_volume_attach_to(name, host)
    }
}
