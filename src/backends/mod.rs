//! Storage backends behind the [`StorageClient`](crate::resources::StorageClient) contract

pub mod localhost;
pub mod scbe;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::common::{Error, Result, ServerConfig};
use crate::metadata::MetadataStore;
use crate::resources::{Backend, StorageClient};

pub use localhost::LocalhostClient;
pub use scbe::ScbeLocalClient;

/// Registered backends, keyed by name
pub type Backends = BTreeMap<Backend, Arc<dyn StorageClient>>;

/// Build every backend that has a configuration section.
///
/// A backend that fails to construct aborts the whole startup.
pub async fn build_backends(config: &ServerConfig, store: Arc<MetadataStore>) -> Result<Backends> {
    if config.spectrum_scale.is_some() {
        return Err(Error::InvalidConfig(format!(
            "backend {} is not supported by this server",
            Backend::SpectrumScale
        )));
    }

    let mut backends: Backends = BTreeMap::new();

    if let Some(scbe) = &config.scbe {
        tracing::info!(management_ip = %scbe.connection_info.management_ip, "Initializing SAN backend");
        let client = ScbeLocalClient::connect(scbe.clone(), store.clone()).await?;
        backends.insert(Backend::Scbe, Arc::new(client));
    }

    if let Some(localhost) = &config.localhost {
        tracing::info!(root = %localhost.localhost_path.display(), "Initializing local-disk backend");
        let client = LocalhostClient::new(localhost, store.clone())?;
        backends.insert(Backend::Localhost, Arc::new(client));
    }

    if backends.is_empty() {
        return Err(Error::InvalidConfig(
            "no backend configured, add a [scbe] or [localhost] section".into(),
        ));
    }

    let default = config.default_backend.parse::<Backend>()?;
    if !backends.contains_key(&default) {
        return Err(Error::InvalidConfig(format!(
            "default backend {} is not configured",
            default
        )));
    }

    Ok(backends)
}
