//! SAN backend: the volume lifecycle state machine
//!
//! The local store decides whether a volume exists and which WWN and
//! filesystem it has. The controller decides whether it is mapped. Every
//! destructive or mapping step calls the controller first and only then
//! updates the local record; a failure of the second step is returned as is,
//! without undoing the first.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backends::scbe::datamodel::{ScbeDataModel, ScbeVolume, ScbeVolumeStore};
use crate::backends::scbe::scbe_rest::{ScbeRestClient, ScbeRestClientImpl};
use crate::common::config::{
    DEFAULT_FILESYSTEM_TYPE, DEFAULT_VOLUME_SIZE, UBIQUITY_INSTANCE_NAME_MAX_SIZE,
};
use crate::common::{string_in_slice, Error, Locker, Result, ScbeConfig};
use crate::metadata::MetadataStore;
use crate::ops::verify::AttachmentMismatch;
use crate::resources::{
    Backend, StorageClient, Volume, VolumeConfig, VolumeMetadata, OPTION_NAME_FOR_VOLUME_FS_TYPE,
};

pub const OPTION_NAME_FOR_SERVICE_NAME: &str = "profile";
pub const OPTION_NAME_FOR_VOLUME_SIZE: &str = "size";

/// Prefix reserved for volumes this daemon creates on the controller
pub const VOLUME_NAME_PREFIX: &str = "u_";

/// Controller limit on volume names
pub const MAX_VOLUME_NAME_LENGTH: usize = 63;

pub const SUPPORTED_FS_TYPES: [&str; 2] = ["ext4", "xfs"];

/// Where a block volume is mounted on the host
pub fn mountpoint_for(wwn: &str) -> String {
    format!("/ubiquity/{}", wwn)
}

/// `u_<instance>_<name>`
pub fn compose_volume_name(instance_name: &str, name: &str) -> String {
    format!("{}{}_{}", VOLUME_NAME_PREFIX, instance_name, name)
}

/// Fill unset defaults in `config` and reject invalid values
pub fn validate_scbe_config(config: &mut ScbeConfig) -> Result<()> {
    if config.default_volume_size.is_empty() {
        tracing::debug!(
            default = DEFAULT_VOLUME_SIZE,
            "No default_volume_size configured, using default"
        );
        config.default_volume_size = DEFAULT_VOLUME_SIZE.to_string();
    }
    match config.default_volume_size.parse::<i64>() {
        Ok(size) if size > 0 => {}
        _ => return Err(Error::ConfigDefaultSizeNotNumber),
    }

    if config.default_filesystem_type.is_empty() {
        tracing::debug!(
            default = DEFAULT_FILESYSTEM_TYPE,
            "No default_filesystem_type configured, using default"
        );
        config.default_filesystem_type = DEFAULT_FILESYSTEM_TYPE.to_string();
    } else if !string_in_slice(&config.default_filesystem_type, &SUPPORTED_FS_TYPES) {
        return Err(Error::ConfigFilesystemTypeUnsupported {
            fstype: config.default_filesystem_type.clone(),
            supported: SUPPORTED_FS_TYPES.join(","),
        });
    }

    if config.ubiquity_instance_name.len() > UBIQUITY_INSTANCE_NAME_MAX_SIZE {
        return Err(Error::ConfigInstanceNameTooLong {
            name: config.ubiquity_instance_name.clone(),
            max: UBIQUITY_INSTANCE_NAME_MAX_SIZE,
        });
    }
    Ok(())
}

pub struct ScbeLocalClient {
    data_model: Arc<dyn ScbeDataModel>,
    rest: Arc<dyn ScbeRestClient>,
    config: ScbeConfig,
    activated: RwLock<bool>,
    /// Host-keyed locks around controller mapping calls
    locker: Locker,
}

impl ScbeLocalClient {
    /// Backend over the metadata store and a live controller connection
    pub async fn connect(config: ScbeConfig, store: Arc<MetadataStore>) -> Result<Self> {
        let data_model = ScbeVolumeStore::new(store);
        data_model.create_volume_table()?;
        let rest = ScbeRestClientImpl::new(&config.connection_info)?;
        Self::with_clients(config, Arc::new(data_model), Arc::new(rest)).await
    }

    /// Validate the configuration, log in and check the default service.
    ///
    /// Any failure means the backend must not be registered.
    pub async fn with_clients(
        mut config: ScbeConfig,
        data_model: Arc<dyn ScbeDataModel>,
        rest: Arc<dyn ScbeRestClient>,
    ) -> Result<Self> {
        validate_scbe_config(&mut config)?;
        let management_ip = config.connection_info.management_ip.clone();

        if let Err(e) = rest.login().await {
            tracing::error!(management_ip = %management_ip, error = %e, "Login to SAN controller failed");
            return Err(e);
        }
        tracing::info!(management_ip = %management_ip, "Logged in to SAN controller");

        if !rest.service_exist(&config.default_service).await? {
            tracing::error!(
                management_ip = %management_ip,
                service = %config.default_service,
                "Default service does not exist"
            );
            return Err(Error::DefaultServiceNotFound {
                service: config.default_service.clone(),
                management_ip,
            });
        }
        tracing::info!(management_ip = %management_ip, service = %config.default_service, "Default service exists");

        Ok(Self {
            data_model,
            rest,
            config,
            activated: RwLock::new(false),
            locker: Locker::new(),
        })
    }

    /// Configuration after defaults were applied
    pub fn config(&self) -> &ScbeConfig {
        &self.config
    }

    fn existing_volume(&self, name: &str) -> Result<ScbeVolume> {
        self.data_model
            .get_volume(name)?
            .ok_or_else(|| Error::VolumeNotFound(name.to_string()))
    }
}

#[async_trait]
impl StorageClient for ScbeLocalClient {
    fn backend(&self) -> Backend {
        Backend::Scbe
    }

    async fn activate(&self) -> Result<()> {
        if *self.activated.read().await {
            return Ok(());
        }
        let mut activated = self.activated.write().await;
        // Nothing to do on the controller beyond what startup validated
        *activated = true;
        tracing::debug!("SAN backend activated");
        Ok(())
    }

    async fn create_volume(
        &self,
        name: &str,
        capacity_bytes: u64,
        metadata: &VolumeMetadata,
    ) -> Result<Volume> {
        if self.data_model.get_volume(name)?.is_some() {
            tracing::warn!(volume = %name, "Volume already exists");
            return Err(Error::VolumeAlreadyExists(name.to_string()));
        }

        let size_option = match metadata.get(OPTION_NAME_FOR_VOLUME_SIZE) {
            Some(size) => size.as_str(),
            None => {
                tracing::debug!(volume = %name, default_size = %self.config.default_volume_size, "No size given, using default");
                self.config.default_volume_size.as_str()
            }
        };
        let size: i64 = size_option.parse().map_err(|_| Error::OptionNotANumber {
            volume: name.to_string(),
            option: OPTION_NAME_FOR_VOLUME_SIZE.to_string(),
        })?;

        let fstype = metadata
            .get(OPTION_NAME_FOR_VOLUME_FS_TYPE)
            .map(String::as_str)
            .unwrap_or(&self.config.default_filesystem_type);
        if !string_in_slice(fstype, &SUPPORTED_FS_TYPES) {
            return Err(Error::FsTypeNotSupported {
                volume: name.to_string(),
                fstype: fstype.to_string(),
                supported: SUPPORTED_FS_TYPES.join(","),
            });
        }

        let profile = match metadata.get(OPTION_NAME_FOR_SERVICE_NAME) {
            Some(profile) if !profile.is_empty() => profile.as_str(),
            _ => self.config.default_service.as_str(),
        };

        let instance = &self.config.ubiquity_instance_name;
        let composed = compose_volume_name(instance, name);
        if composed.len() > MAX_VOLUME_NAME_LENGTH {
            let prefix_len = compose_volume_name(instance, "").len();
            return Err(Error::VolumeNameTooLong {
                name: name.to_string(),
                max: MAX_VOLUME_NAME_LENGTH - prefix_len,
            });
        }

        let info = self.rest.create_volume(&composed, profile, size).await?;

        let volume = Volume::new(name, Backend::Scbe, capacity_bytes, metadata.clone());
        self.data_model.insert_volume(&ScbeVolume {
            volume: volume.clone(),
            wwn: info.wwn,
            attach_to: String::new(),
            fstype: fstype.to_string(),
        })?;

        tracing::info!(volume = %name, profile = %profile, "Volume created");
        Ok(volume)
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        let existing = self.existing_volume(name)?;
        if existing.is_attached() {
            return Err(Error::CannotDeleteAttachedVolume {
                volume: name.to_string(),
                host: existing.attach_to,
            });
        }

        self.rest.delete_volume(&existing.wwn).await?;
        self.data_model.delete_volume(name)?;

        tracing::info!(volume = %name, wwn = %existing.wwn, "Volume removed");
        Ok(())
    }

    async fn attach(&self, name: &str, host: &str) -> Result<String> {
        if host.is_empty() {
            return Err(Error::InvalidRequest {
                request: "attachRequest".into(),
                field: "Host".into(),
                value: host.to_string(),
                expected: "none empty string".into(),
            });
        }
        if name.is_empty() {
            return Err(Error::InvalidRequest {
                request: "attachRequest".into(),
                field: "Name".into(),
                value: name.to_string(),
                expected: "none empty string".into(),
            });
        }

        let existing = self.existing_volume(name)?;
        if existing.attach_to == host {
            tracing::info!(volume = %name, host = %host, "Volume already attached, skipping map");
            return Ok(mountpoint_for(&existing.wwn));
        }
        if existing.is_attached() {
            return Err(Error::VolumeAlreadyAttached {
                volume: name.to_string(),
                host: existing.attach_to,
            });
        }

        // The controller picks the next free LUN per host
        {
            let _host_guard = self.locker.write_lock(host).await;
            tracing::debug!(volume = %name, wwn = %existing.wwn, host = %host, "Mapping volume");
            self.rest.map_volume(&existing.wwn, host).await?;
        }

        self.data_model.update_volume_attach_to(name, host)?;
        tracing::info!(volume = %name, host = %host, "Volume attached");
        Ok(mountpoint_for(&existing.wwn))
    }

    async fn detach(&self, name: &str, host: &str) -> Result<()> {
        let existing = self.existing_volume(name)?;
        if !existing.is_attached() {
            return Err(Error::VolumeNotAttached(name.to_string()));
        }

        tracing::debug!(volume = %name, wwn = %existing.wwn, host = %host, "Unmapping volume");
        self.rest.unmap_volume(&existing.wwn, host).await?;
        self.data_model.update_volume_attach_to(name, "")?;

        tracing::info!(volume = %name, host = %host, "Volume detached");
        Ok(())
    }

    async fn get_volume(&self, name: &str) -> Result<Volume> {
        Ok(self.existing_volume(name)?.volume)
    }

    async fn get_volume_config(&self, name: &str) -> Result<VolumeConfig> {
        let existing = self.existing_volume(name)?;

        let mut volumes = self.rest.get_volumes(&existing.wwn).await?;
        if volumes.len() != 1 {
            tracing::error!(volume = %name, found = volumes.len(), "Unexpected controller volume count");
            return Err(Error::VolumeNotFoundOnController(name.to_string()));
        }
        let remote = volumes.remove(0);

        let mut config = match serde_json::to_value(remote)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(Error::Internal(format!(
                    "controller volume serialized to {}",
                    other
                )))
            }
        };
        // The host side formats the device with this filesystem
        config.insert(
            OPTION_NAME_FOR_VOLUME_FS_TYPE.to_string(),
            serde_json::Value::String(existing.fstype),
        );
        Ok(config)
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>> {
        let records = self.data_model.list_volumes()?;
        tracing::debug!(count = records.len(), "Listed SAN volumes");
        Ok(records.into_iter().map(|record| record.volume).collect())
    }

    async fn verify(&self) -> Result<Vec<AttachmentMismatch>> {
        let mut mismatches = Vec::new();
        for record in self.data_model.list_volumes()? {
            let remote_host = self.rest.get_vol_mapping(&record.wwn).await?;
            if remote_host != record.attach_to {
                tracing::warn!(
                    volume = %record.volume.name,
                    local = %record.attach_to,
                    remote = %remote_host,
                    "Attachment mismatch"
                );
                mismatches.push(AttachmentMismatch {
                    backend: Backend::Scbe,
                    volume: record.volume.name.clone(),
                    local_host: record.attach_to.clone(),
                    remote_host,
                });
            }
        }
        Ok(mismatches)
    }
}
