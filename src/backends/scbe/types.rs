//! Wire types of the SAN controller REST API

use serde::{Deserialize, Serialize};

/// Credentials posted to the auth endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub group: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: String,
}

/// A storage service (profile) volumes are provisioned under
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScbeStorageService {
    pub id: String,
    #[serde(default)]
    pub unique_identifier: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub capability_values: String,
    #[serde(default, rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub physical_size: u64,
    #[serde(default)]
    pub logical_size: u64,
    #[serde(default)]
    pub physical_free: u64,
    #[serde(default)]
    pub logical_free: u64,
    #[serde(default)]
    pub total_capacity: u64,
    #[serde(default)]
    pub used_capacity: u64,
    #[serde(default)]
    pub max_resource_logical_free: u64,
    #[serde(default)]
    pub max_resource_free_size_for_provisioning: u64,
    #[serde(default)]
    pub num_volumes: u64,
    #[serde(default)]
    pub has_admin: bool,
    #[serde(default)]
    pub qos_max_iops: u64,
    #[serde(default)]
    pub qos_max_mbps: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScbeCreateVolumePostParams<'a> {
    pub service_id: &'a str,
    pub name: &'a str,
    pub size: i64,
    pub size_unit: &'a str,
}

/// A volume as reported by the controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScbeResponseVolume {
    #[serde(default)]
    pub id: String,
    pub scsi_identifier: String,
    #[serde(default)]
    pub array_type: String,
    #[serde(default)]
    pub array: String,
    #[serde(default)]
    pub array_name: String,
    #[serde(default)]
    pub pool_name: String,
    #[serde(default)]
    pub pool_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logical_capacity: u64,
    #[serde(default)]
    pub physical_capacity: u64,
    #[serde(default)]
    pub capacity: u64,
    #[serde(default)]
    pub used_capacity: u64,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub service_id: String,
}

/// What the backend keeps from a freshly created volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScbeVolumeInfo {
    pub name: String,
    pub wwn: String,
    pub service_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScbeResponseHost {
    pub id: i64,
    #[serde(default)]
    pub array_type: String,
    #[serde(default)]
    pub array: String,
    #[serde(default)]
    pub host_id: String,
    pub name: String,
    #[serde(default)]
    pub storage_cluster: String,
    #[serde(default)]
    pub physical_host: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScbeMapVolumePostParams<'a> {
    pub volume_id: &'a str,
    pub host_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScbeResponseMapping {
    pub id: i64,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub host: i64,
    #[serde(default)]
    pub lun_number: i64,
    #[serde(default)]
    pub array: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScbeResponseMappings {
    #[serde(default)]
    pub mappings: Vec<ScbeResponseMapping>,
}
