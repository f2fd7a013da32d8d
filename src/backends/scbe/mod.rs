//! SAN (block storage controller) backend

pub mod client;
pub mod datamodel;
pub mod rest;
pub mod scbe_rest;
pub mod types;

pub use client::{compose_volume_name, validate_scbe_config, ScbeLocalClient};
pub use datamodel::{ScbeDataModel, ScbeVolume, ScbeVolumeStore};
pub use rest::RestClient;
pub use scbe_rest::{ScbeRestClient, ScbeRestClientImpl};
pub use types::{ScbeResponseMapping, ScbeResponseVolume, ScbeVolumeInfo};
