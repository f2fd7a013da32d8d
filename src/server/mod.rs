//! Daemon bootstrap

pub mod http;

pub use http::{create_router, ApiState};

use std::sync::Arc;

use crate::backends::build_backends;
use crate::common::{Result, ServerConfig};
use crate::metadata::MetadataStore;

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting ubiquity server");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  DB path: {}", self.config.db_path.display());
        tracing::info!("  Default backend: {}", self.config.default_backend);

        let metadata = Arc::new(MetadataStore::open(&self.config.db_path)?);
        let backends = build_backends(&self.config, metadata.clone()).await?;
        let names: Vec<&str> = backends.keys().map(|b| b.as_str()).collect();
        tracing::info!("  Backends: {}", names.join(", "));

        let state = ApiState::new(backends, metadata.clone(), &self.config.default_backend);
        let router = create_router(state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("Server ready");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        metadata.flush()?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
