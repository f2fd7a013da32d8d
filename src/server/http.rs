//! HTTP API of the daemon
//!
//! Every volume operation is routed to the backend that owns the volume and
//! runs under the per-volume write lock. Error bodies are
//! `{"err": "<message>"}`: 404 when the owning backend cannot be resolved,
//! 409 for every other failure, 500 when activation fails.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::backends::Backends;
use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, Locker, Result};
use crate::metadata::MetadataStore;
use crate::ops::verify::verify_backends;
use crate::resources::{
    ActivateRequest, AttachRequest, AttachResponse, Backend, CreateVolumeRequest,
    CreateVolumeResponse, DetachRequest, GenericResponse, GetVolumeConfigRequest,
    GetVolumeConfigResponse, GetVolumeRequest, GetVolumeResponse, ListVolumesRequest,
    ListVolumesResponse, RemoveVolumeRequest, StorageClient,
};

/// Request bodies are small JSON documents
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct ApiState {
    pub backends: Arc<Backends>,
    pub metadata: Arc<MetadataStore>,
    pub locker: Arc<Locker>,
    /// Backend used when a create request names none
    pub default_backend: String,
}

impl ApiState {
    pub fn new(backends: Backends, metadata: Arc<MetadataStore>, default_backend: &str) -> Self {
        Self {
            backends: Arc::new(backends),
            metadata,
            locker: Arc::new(Locker::new()),
            default_backend: default_backend.to_string(),
        }
    }

    /// A registered backend named by the client
    fn registered_backend(&self, name: &str) -> Result<Arc<dyn StorageClient>> {
        name.parse::<Backend>()
            .ok()
            .and_then(|backend| self.backends.get(&backend).cloned())
            .ok_or_else(|| Error::UnknownBackend(name.to_string()))
    }

    /// The backend that owns an existing volume
    fn backend_for_volume(&self, name: &str) -> Result<Arc<dyn StorageClient>> {
        let backend = match self.metadata.get_backend_for_volume(name) {
            Ok(Some(backend)) => backend,
            Ok(None) => return Err(Error::VolumeBackendUnresolved(name.to_string())),
            // A failed lookup is reported as an unknown volume
            Err(e) => {
                tracing::warn!(volume = %name, error = %e, "Backend lookup failed");
                return Err(Error::VolumeBackendUnresolved(name.to_string()));
            }
        };
        self.backends
            .get(&backend)
            .cloned()
            .ok_or_else(|| Error::BackendNotFound(backend.to_string()))
    }

    /// Backends named in a list/activate request, or all of them
    fn selected_backends(&self, names: &[String]) -> Result<Vec<(Backend, Arc<dyn StorageClient>)>> {
        if names.is_empty() {
            return Ok(self
                .backends
                .iter()
                .map(|(backend, client)| (*backend, client.clone()))
                .collect());
        }
        names
            .iter()
            .map(|name| {
                let client = self.registered_backend(name)?;
                Ok((client.backend(), client))
            })
            .collect()
    }
}

/// Creates the HTTP router with all public endpoints.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/activate", post(activate))
        .route("/volumes", post(create_volume))
        .route("/volumes/remove", post(remove_volume))
        .route("/volumes/attach", post(attach_volume))
        .route("/volumes/detach", post(detach_volume))
        .route("/volumes/get", post(get_volume))
        .route("/volumes/volumeConfig", post(get_volume_config))
        .route("/volumes/list", post(list_volumes))
        .route("/admin/verify", post(admin_verify))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_tracing_middleware))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

fn error_response(status: StatusCode, err: impl ToString) -> Response {
    (status, Json(GenericResponse { err: err.to_string() })).into_response()
}

fn domain_error(e: &Error) -> Response {
    error_response(e.to_http_status(), e)
}

fn ok<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

/// Malformed bodies are a conflict, like every other client error
fn parse<T: DeserializeOwned>(body: &Bytes) -> std::result::Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "Cannot unmarshal request body");
        error_response(StatusCode::CONFLICT, e)
    })
}

async fn activate(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: ActivateRequest = match parse(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    if !req.backends.is_empty() {
        let selected = match state.selected_backends(&req.backends) {
            Ok(selected) => selected,
            Err(e) => return domain_error(&e),
        };
        for (backend, client) in selected {
            tracing::info!(backend = %backend, "Activating backend");
            if let Err(e) = client.activate().await {
                tracing::error!(backend = %backend, error = %e, "Activation failed");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
            }
        }
        return ok(json!({}));
    }

    tracing::info!("Activating all backends");
    let mut failed = Vec::new();
    for (backend, client) in state.backends.iter() {
        if let Err(e) = client.activate().await {
            tracing::error!(backend = %backend, error = %e, "Activation failed");
            failed.push(backend.to_string());
        }
    }
    if !failed.is_empty() {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, failed.join(","));
    }
    ok(json!({}))
}

async fn create_volume(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: CreateVolumeRequest = match parse(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    let backend_name = match req.backend.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => state.default_backend.as_str(),
    };
    let client = match state.registered_backend(backend_name) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(backend = %backend_name, "Backend not found");
            return domain_error(&e);
        }
    };

    // Waits for an in-flight create of the same name
    {
        let _read = state.locker.read_lock(&req.name).await;
        match state.metadata.volume_exists(&req.name) {
            Ok(false) => {}
            Ok(true) => {
                return error_response(
                    StatusCode::CONFLICT,
                    format!("Volume `{}` already exists", req.name),
                )
            }
            Err(e) => return domain_error(&e),
        }
    }

    let _write = state.locker.write_lock(&req.name).await;
    match client
        .create_volume(&req.name, req.capacity_bytes, &req.metadata)
        .await
    {
        Ok(volume) => ok(CreateVolumeResponse { volume }),
        Err(e) => {
            tracing::warn!(volume = %req.name, backend = %client.backend(), error = %e, "Create failed");
            domain_error(&e)
        }
    }
}

async fn remove_volume(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: RemoveVolumeRequest = match parse(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let client = match state.backend_for_volume(&req.name) {
        Ok(client) => client,
        Err(e) => return domain_error(&e),
    };

    let _write = state.locker.write_lock(&req.name).await;
    match client.remove_volume(&req.name).await {
        Ok(()) => ok(json!({})),
        Err(e) => domain_error(&e),
    }
}

async fn attach_volume(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: AttachRequest = match parse(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let client = match state.backend_for_volume(&req.name) {
        Ok(client) => client,
        Err(e) => return domain_error(&e),
    };

    let _write = state.locker.write_lock(&req.name).await;
    match client.attach(&req.name, &req.host).await {
        Ok(mountpoint) => ok(AttachResponse { mountpoint }),
        Err(e) => domain_error(&e),
    }
}

async fn detach_volume(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: DetachRequest = match parse(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let client = match state.backend_for_volume(&req.name) {
        Ok(client) => client,
        Err(e) => return domain_error(&e),
    };

    let _write = state.locker.write_lock(&req.name).await;
    match client.detach(&req.name, &req.host).await {
        Ok(()) => ok(json!({})),
        Err(e) => domain_error(&e),
    }
}

async fn get_volume(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: GetVolumeRequest = match parse(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let client = match state.backend_for_volume(&req.name) {
        Ok(client) => client,
        Err(e) => return domain_error(&e),
    };

    let _write = state.locker.write_lock(&req.name).await;
    match client.get_volume(&req.name).await {
        Ok(volume) => ok(GetVolumeResponse { volume }),
        Err(e) => domain_error(&e),
    }
}

async fn get_volume_config(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: GetVolumeConfigRequest = match parse(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let client = match state.backend_for_volume(&req.name) {
        Ok(client) => client,
        Err(e) => return domain_error(&e),
    };

    let _write = state.locker.write_lock(&req.name).await;
    match client.get_volume_config(&req.name).await {
        Ok(volume_config) => ok(GetVolumeConfigResponse { volume_config }),
        Err(e) => domain_error(&e),
    }
}

async fn list_volumes(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: ListVolumesRequest = match parse(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let selected = match state.selected_backends(&req.backends) {
        Ok(selected) => selected,
        Err(e) => return domain_error(&e),
    };

    let mut volumes = Vec::new();
    for (backend, client) in selected {
        match client.list_volumes().await {
            Ok(found) => volumes.extend(found),
            Err(e) => {
                tracing::error!(backend = %backend, error = %e, "Listing volumes failed");
                return error_response(StatusCode::CONFLICT, e);
            }
        }
    }
    tracing::debug!(count = volumes.len(), "Listed volumes");
    ok(ListVolumesResponse { volumes })
}

/// Admin endpoint: compares local attachment state with the backends
async fn admin_verify(State(state): State<ApiState>) -> Response {
    let report = verify_backends(&state.backends).await;
    let status = if report.is_consistent() {
        "ok"
    } else {
        "inconsistent"
    };
    ok(json!({ "status": status, "report": report }))
}

/// Health check endpoint with the registered backends.
async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let backends: Vec<&str> = state.backends.keys().map(|b| b.as_str()).collect();
    Json(json!({
        "status": "healthy",
        "backends": backends,
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}
