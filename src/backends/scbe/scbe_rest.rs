//! Controller operations built on the session-aware [`RestClient`]

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::backends::scbe::rest::RestClient;
use crate::backends::scbe::types::{
    ScbeCreateVolumePostParams, ScbeMapVolumePostParams, ScbeResponseHost, ScbeResponseMapping,
    ScbeResponseMappings, ScbeResponseVolume, ScbeStorageService, ScbeVolumeInfo,
};
use crate::common::{encode_segment, ConnectionInfo, Error, Result};

pub const URL_SCBE_RESOURCE_SERVICE: &str = "services";
pub const URL_SCBE_RESOURCE_VOLUME: &str = "volumes";
pub const URL_SCBE_RESOURCE_MAPPING: &str = "mappings";
pub const URL_SCBE_RESOURCE_HOST: &str = "hosts";

/// Unit of the `size` sent on volume creation
pub const SIZE_UNIT: &str = "gb";

/// Operations the SAN backend needs from its controller
#[async_trait]
pub trait ScbeRestClient: Send + Sync {
    async fn login(&self) -> Result<()>;

    /// Provision `vol_name` under `service_name` with `size` GB
    async fn create_volume(
        &self,
        vol_name: &str,
        service_name: &str,
        size: i64,
    ) -> Result<ScbeVolumeInfo>;

    /// Volumes matching `wwn`, or every volume when `wwn` is empty
    async fn get_volumes(&self, wwn: &str) -> Result<Vec<ScbeResponseVolume>>;

    async fn delete_volume(&self, wwn: &str) -> Result<()>;

    async fn map_volume(&self, wwn: &str, host: &str) -> Result<ScbeResponseMapping>;

    async fn unmap_volume(&self, wwn: &str, host: &str) -> Result<()>;

    /// Host the volume is mapped to, or an empty string
    async fn get_vol_mapping(&self, wwn: &str) -> Result<String>;

    async fn service_exist(&self, service_name: &str) -> Result<bool>;
}

pub struct ScbeRestClientImpl {
    client: RestClient,
    management_ip: String,
}

impl ScbeRestClientImpl {
    pub fn new(connection: &ConnectionInfo) -> Result<Self> {
        Ok(Self::with_rest_client(
            RestClient::new(connection)?,
            &connection.management_ip,
        ))
    }

    pub fn with_rest_client(client: RestClient, management_ip: &str) -> Self {
        Self {
            client,
            management_ip: management_ip.to_string(),
        }
    }

    async fn service_list(&self, service_name: &str) -> Result<Vec<ScbeStorageService>> {
        let mut params = Vec::new();
        if !service_name.is_empty() {
            params.push(("name", service_name.to_string()));
        }
        self.client
            .get(URL_SCBE_RESOURCE_SERVICE, &params, None)
            .await
    }

    /// Controller id of `host` on the array that holds `wwn`
    async fn host_id_by_volume(&self, wwn: &str, host: &str) -> Result<i64> {
        let volumes = self.get_volumes(wwn).await?;
        let [volume] = volumes.as_slice() else {
            return Err(Error::VolumeNotFoundOnController(wwn.to_string()));
        };

        let params = [
            ("array_id", volume.array.clone()),
            ("name", host.to_string()),
        ];
        let hosts: Vec<ScbeResponseHost> = self
            .client
            .get(URL_SCBE_RESOURCE_HOST, &params, Some(StatusCode::OK))
            .await?;
        match hosts.as_slice() {
            [found] => Ok(found.id),
            _ => Err(Error::HostNotFound(host.to_string())),
        }
    }
}

#[async_trait]
impl ScbeRestClient for ScbeRestClientImpl {
    async fn login(&self) -> Result<()> {
        self.client.login().await
    }

    async fn create_volume(
        &self,
        vol_name: &str,
        service_name: &str,
        size: i64,
    ) -> Result<ScbeVolumeInfo> {
        let services = self.service_list(service_name).await?;
        let service = services
            .iter()
            .find(|s| s.name == service_name)
            .ok_or_else(|| Error::ServiceNotFound {
                volume: vol_name.to_string(),
                service: service_name.to_string(),
                management_ip: self.management_ip.clone(),
            })?;

        let payload = ScbeCreateVolumePostParams {
            service_id: &service.id,
            name: vol_name,
            size,
            size_unit: SIZE_UNIT,
        };
        let volume: ScbeResponseVolume = self
            .client
            .post(URL_SCBE_RESOURCE_VOLUME, &payload, Some(StatusCode::CREATED))
            .await?;

        tracing::info!(volume = %vol_name, wwn = %volume.scsi_identifier, service = %service_name, "Volume provisioned on controller");
        Ok(ScbeVolumeInfo {
            name: volume.name,
            wwn: volume.scsi_identifier,
            service_name: service_name.to_string(),
        })
    }

    async fn get_volumes(&self, wwn: &str) -> Result<Vec<ScbeResponseVolume>> {
        let mut params = Vec::new();
        if !wwn.is_empty() {
            params.push(("scsi_identifier", wwn.to_string()));
        }
        self.client
            .get(URL_SCBE_RESOURCE_VOLUME, &params, Some(StatusCode::OK))
            .await
    }

    async fn delete_volume(&self, wwn: &str) -> Result<()> {
        let resource = format!("{}/{}", URL_SCBE_RESOURCE_VOLUME, encode_segment(wwn));
        self.client.delete(&resource, Some(StatusCode::OK)).await
    }

    async fn map_volume(&self, wwn: &str, host: &str) -> Result<ScbeResponseMapping> {
        let host_id = self.host_id_by_volume(wwn, host).await?;
        let payload = ScbeMapVolumePostParams {
            volume_id: wwn,
            host_id,
        };
        let response: ScbeResponseMappings = self
            .client
            .post(URL_SCBE_RESOURCE_MAPPING, &payload, Some(StatusCode::CREATED))
            .await?;

        let found = response.mappings.len();
        match <[ScbeResponseMapping; 1]>::try_from(response.mappings) {
            Ok([mapping]) => Ok(mapping),
            Err(_) => Err(Error::MappingNotFound {
                wwn: wwn.to_string(),
                host: host.to_string(),
                found,
            }),
        }
    }

    async fn unmap_volume(&self, wwn: &str, host: &str) -> Result<()> {
        let host_id = self.host_id_by_volume(wwn, host).await?;
        let params = [("volume", wwn.to_string()), ("host", host_id.to_string())];
        let mappings: Vec<ScbeResponseMapping> = self
            .client
            .get(URL_SCBE_RESOURCE_MAPPING, &params, Some(StatusCode::OK))
            .await?;

        let [mapping] = mappings.as_slice() else {
            return Err(Error::MappingNotFound {
                wwn: wwn.to_string(),
                host: host.to_string(),
                found: mappings.len(),
            });
        };

        let resource = format!("{}/{}", URL_SCBE_RESOURCE_MAPPING, mapping.id);
        self.client.delete(&resource, Some(StatusCode::OK)).await
    }

    async fn get_vol_mapping(&self, wwn: &str) -> Result<String> {
        let params = [("volume", wwn.to_string())];
        let mappings: Vec<ScbeResponseMapping> = self
            .client
            .get(URL_SCBE_RESOURCE_MAPPING, &params, Some(StatusCode::OK))
            .await?;

        match mappings.as_slice() {
            [] => Ok(String::new()),
            [mapping] => {
                let resource = format!("{}/{}", URL_SCBE_RESOURCE_HOST, mapping.host);
                let host: ScbeResponseHost = self
                    .client
                    .get(&resource, &[], Some(StatusCode::OK))
                    .await?;
                Ok(host.name)
            }
            _ => Err(Error::MappingNotFound {
                wwn: wwn.to_string(),
                host: String::new(),
                found: mappings.len(),
            }),
        }
    }

    async fn service_exist(&self, service_name: &str) -> Result<bool> {
        // The controller filters by name; any result counts
        let services = self.service_list(service_name).await?;
        Ok(!services.is_empty())
    }
}
