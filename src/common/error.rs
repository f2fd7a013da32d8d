//! Error types for ubiquity

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Metadata Errors ===
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Metadata corrupted: {0}")]
    MetadataCorrupted(String),

    #[error("Volume [{name}] already exists in backend [{backend}]")]
    DuplicateKey { name: String, backend: String },

    #[error("Volume : {0} not found")]
    RecordNotFound(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Error in config file. The parameter [default_volume_size] must be a positive number")]
    ConfigDefaultSizeNotNumber,

    #[error("Error in config file. The parameter [default_filesystem_type] value [{fstype}] is not supported. Supported values are [{supported}]")]
    ConfigFilesystemTypeUnsupported { fstype: String, supported: String },

    #[error("Error in config file. The parameter [ubiquity_instance_name] [{name}] exceeds the maximum length of {max} characters")]
    ConfigInstanceNameTooLong { name: String, max: usize },

    // === Activation Errors ===
    #[error("Error in activate SCBE backend {management_ip}. The default service [{service}] does not exist in SCBE")]
    DefaultServiceNotFound {
        service: String,
        management_ip: String,
    },

    // === Validation Errors ===
    #[error("Invalid request {request}: field [{field}] value [{value}] expected {expected}")]
    InvalidRequest {
        request: String,
        field: String,
        value: String,
        expected: String,
    },

    #[error("Volume [{0}] already exists.")]
    VolumeAlreadyExists(String),

    #[error("Fail to provision volume [{volume}]. The [{option}] option must be a number.")]
    OptionNotANumber { volume: String, option: String },

    #[error("Volume [{volume}] fstype [{fstype}] is not supported. Supported values are [{supported}]")]
    FsTypeNotSupported {
        volume: String,
        fstype: String,
        supported: String,
    },

    #[error("Volume name [{name}] is too long. The maximum volume name length is [{max}]")]
    VolumeNameTooLong { name: String, max: usize },

    // === State Errors ===
    #[error("Volume [{0}] not found")]
    VolumeNotFound(String),

    #[error("Volume [{volume}] already attached to host [{host}]")]
    VolumeAlreadyAttached { volume: String, host: String },

    #[error("Volume [{0}] is not attached to any host")]
    VolumeNotAttached(String),

    #[error("Cannot delete volume [{volume}] which is attached to host [{host}]")]
    CannotDeleteAttachedVolume { volume: String, host: String },

    #[error("Volume [{0}] was not found on the storage controller")]
    VolumeNotFoundOnController(String),

    // === Remote (SAN controller) Errors ===
    #[error("failed executing http request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error, bad status code of http response. expected [{expected}], actual [{actual}]")]
    BadStatusCode { expected: String, actual: u16 },

    #[error("Token is empty")]
    EmptyToken,

    #[error("Unauthorized: the controller rejected the refreshed token for {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Unmarshal(#[from] serde_json::Error),

    #[error("Cannot create volume [{volume}] on service [{service}]. Reason : Service does not exist or not delegated to the Ubiquity interface in [{management_ip}]")]
    ServiceNotFound {
        volume: String,
        service: String,
        management_ip: String,
    },

    #[error("Host [{0}] was not found on the storage controller")]
    HostNotFound(String),

    #[error("Expected exactly one mapping of volume [{wwn}] to host [{host}], found {found}")]
    MappingNotFound {
        wwn: String,
        host: String,
        found: usize,
    },

    // === Routing Errors ===
    #[error("Cannot find backend {0}")]
    BackendNotFound(String),

    #[error("Volume not found")]
    VolumeBackendUnresolved(String),

    #[error("backend-not-found")]
    UnknownBackend(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Did the failure happen while resolving which backend owns a request?
    pub fn is_backend_resolution(&self) -> bool {
        matches!(
            self,
            Error::BackendNotFound(_) | Error::VolumeBackendUnresolved(_) | Error::UnknownBackend(_)
        )
    }

    /// Convert to the HTTP status returned by the volume API.
    ///
    /// Backend resolution failures are 404, every other domain error is a
    /// conflict.
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        if self.is_backend_resolution() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::CONFLICT
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
