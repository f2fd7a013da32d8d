//! HTTP router tests driven through `tower::ServiceExt::oneshot`

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{open_store, scbe_config, FailingDataModel, FakeScbeRestClient};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use ubiquity::backends::scbe::{ScbeDataModel, ScbeLocalClient, ScbeVolume, ScbeVolumeStore};
use ubiquity::backends::{Backends, LocalhostClient};
use ubiquity::common::LocalhostConfig;
use ubiquity::resources::{Backend, StorageClient, Volume, VolumeMetadata};
use ubiquity::server::{create_router, ApiState};

struct TestApp {
    dir: TempDir,
    rest: Arc<FakeScbeRestClient>,
    router: Router,
}

async fn app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let rest = FakeScbeRestClient::new();

    let scbe = ScbeLocalClient::with_clients(
        scbe_config(),
        FailingDataModel::new(store.clone()),
        rest.clone(),
    )
    .await
    .unwrap();
    let localhost = LocalhostClient::new(
        &LocalhostConfig {
            localhost_path: dir.path().join("volumes"),
        },
        store.clone(),
    )
    .unwrap();

    let mut backends: Backends = BTreeMap::new();
    backends.insert(Backend::Scbe, Arc::new(scbe) as Arc<dyn StorageClient>);
    backends.insert(Backend::Localhost, Arc::new(localhost) as Arc<dyn StorageClient>);

    let router = create_router(ApiState::new(backends, store, "localhost"));
    TestApp { dir, rest, router }
}

async fn call(router: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(router, "POST", uri, body).await
}

#[tokio::test]
async fn test_create_on_default_backend_and_get() {
    let app = app().await;

    let (status, body) = post(&app.router, "/volumes", json!({"name": "vol1", "capacityBytes": 10})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["volume"]["backend"], "localhost");
    assert!(app.dir.path().join("volumes").join("vol1").is_dir());

    let (status, body) = post(&app.router, "/volumes/get", json!({"name": "vol1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["volume"]["name"], "vol1");
    assert_eq!(body["volume"]["capacityBytes"], 10);
}

#[tokio::test]
async fn test_duplicate_create_is_conflict() {
    let app = app().await;
    post(&app.router, "/volumes", json!({"name": "vol1"})).await;

    // The name is taken across backends
    let (status, body) = post(&app.router, "/volumes", json!({"name": "vol1", "backend": "scbe"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["err"], "Volume `vol1` already exists");
    assert_eq!(FakeScbeRestClient::count(&app.rest.create_calls), 0);
}

#[tokio::test]
async fn test_unknown_backend_is_not_found() {
    let app = app().await;
    for backend in ["nfs", "spectrum-scale"] {
        let (status, body) =
            post(&app.router, "/volumes", json!({"name": "vol1", "backend": backend})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["err"], "backend-not-found");
    }
}

#[tokio::test]
async fn test_unknown_volume_is_not_found() {
    let app = app().await;
    for uri in [
        "/volumes/remove",
        "/volumes/attach",
        "/volumes/detach",
        "/volumes/get",
        "/volumes/volumeConfig",
    ] {
        let (status, body) = post(&app.router, uri, json!({"name": "ghost", "host": "h"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["err"], "Volume not found");
    }
}

#[tokio::test]
async fn test_malformed_body_is_conflict() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/volumes")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_san_lifecycle() {
    let app = app().await;
    let r = &app.router;

    let (status, _) = post(
        r,
        "/volumes",
        json!({"name": "vol1", "backend": "scbe", "metadata": {"size": "3", "fstype": "xfs"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(r, "/volumes/attach", json!({"name": "vol1", "host": "node1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mountpoint"], "/ubiquity/WWN-u_abc_vol1");

    let (status, body) = post(r, "/volumes/attach", json!({"name": "vol1", "host": "node2"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["err"], "Volume [vol1] already attached to host [node1]");

    let (status, body) = post(r, "/volumes/remove", json!({"name": "vol1"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["err"].as_str().unwrap().contains("node1"));

    let (status, body) = post(r, "/volumes/volumeConfig", json!({"name": "vol1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["volumeConfig"]["fstype"], "xfs");

    let (status, _) = post(r, "/volumes/detach", json!({"name": "vol1", "host": "node1"})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(r, "/volumes/remove", json!({"name": "vol1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(FakeScbeRestClient::count(&app.rest.delete_calls), 1);

    let (status, _) = post(r, "/volumes/get", json!({"name": "vol1"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remote_error_message_is_returned() {
    let app = app().await;
    FakeScbeRestClient::fail(&app.rest.create_error, "Error, bad status code of http response");
    let (status, body) = post(&app.router, "/volumes", json!({"name": "vol1", "backend": "scbe"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["err"], "Error, bad status code of http response");
}

#[tokio::test]
async fn test_list_aggregates_backends() {
    let app = app().await;
    post(&app.router, "/volumes", json!({"name": "a"})).await;
    post(&app.router, "/volumes", json!({"name": "b", "backend": "scbe"})).await;

    let (status, body) = post(&app.router, "/volumes/list", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["volumes"].as_array().unwrap().len(), 2);

    let (status, body) = post(&app.router, "/volumes/list", json!({"backends": ["scbe"]})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["volumes"][0]["name"], "b");
    assert_eq!(body["volumes"].as_array().unwrap().len(), 1);

    let (status, body) = post(&app.router, "/volumes/list", json!({"backends": ["nfs"]})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err"], "backend-not-found");
}

#[tokio::test]
async fn test_activate() {
    let app = app().await;
    let (status, _) = post(&app.router, "/activate", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.dir.path().join("volumes").is_dir());

    let (status, _) = post(&app.router, "/activate", json!({"backends": ["scbe"]})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app.router, "/activate", json!({"backends": ["nfs"]})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err"], "backend-not-found");
}

#[tokio::test]
async fn test_localhost_attach_reports_directory() {
    let app = app().await;
    post(&app.router, "/volumes", json!({"name": "vol1"})).await;

    let (status, body) = post(&app.router, "/volumes/attach", json!({"name": "vol1", "host": "h"})).await;
    assert_eq!(status, StatusCode::OK);
    let expected = app.dir.path().join("volumes").join("vol1").display().to_string();
    assert_eq!(body["mountpoint"], expected.as_str());

    let (_, body) = post(&app.router, "/volumes/volumeConfig", json!({"name": "vol1"})).await;
    assert_eq!(body["volumeConfig"]["mountpoint"], expected.as_str());
}

#[tokio::test]
async fn test_volume_owned_by_unregistered_backend() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    // A SAN record left by an earlier run with a different configuration
    let san = ScbeVolumeStore::new(store.clone());
    san.create_volume_table().unwrap();
    san.insert_volume(&ScbeVolume {
        volume: Volume::new("old", Backend::Scbe, 0, VolumeMetadata::new()),
        wwn: "WWN-old".into(),
        attach_to: String::new(),
        fstype: "ext4".into(),
    })
    .unwrap();

    let localhost = LocalhostClient::new(
        &LocalhostConfig {
            localhost_path: dir.path().join("volumes"),
        },
        store.clone(),
    )
    .unwrap();
    let mut backends: Backends = BTreeMap::new();
    backends.insert(Backend::Localhost, Arc::new(localhost) as Arc<dyn StorageClient>);
    let router = create_router(ApiState::new(backends, store, "localhost"));

    let (status, body) = post(&router, "/volumes/remove", json!({"name": "old"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err"], "Cannot find backend scbe");
}

#[tokio::test]
async fn test_concurrent_creates_provision_once() {
    let app = app().await;
    let mut handles = Vec::new();
    for _ in 0..6 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            post(&router, "/volumes", json!({"name": "shared", "backend": "scbe"}))
                .await
                .0
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(FakeScbeRestClient::count(&app.rest.create_calls), 1);
}

#[tokio::test]
async fn test_health_and_verify() {
    let app = app().await;

    let request = Request::builder()
        .uri("/health")
        .header("X-Request-ID", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["X-Request-ID"], "req-42");

    let (status, body) = call(&app.router, "GET", "/health", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backends"], json!(["scbe", "localhost"]));

    post(&app.router, "/volumes", json!({"name": "vol1", "backend": "scbe"})).await;
    post(&app.router, "/volumes/attach", json!({"name": "vol1", "host": "node1"})).await;
    let (status, body) = post(&app.router, "/admin/verify", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // The controller loses the mapping behind our back
    app.rest.mappings.lock().unwrap().clear();
    let (_, body) = post(&app.router, "/admin/verify", Value::Null).await;
    assert_eq!(body["status"], "inconsistent");
    assert_eq!(body["report"]["mismatches"][0]["volume"], "vol1");
    assert_eq!(body["report"]["mismatches"][0]["localHost"], "node1");
}
