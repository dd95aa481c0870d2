//! End-to-end tests driving the router in-process.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use blob_store::{
    routes::routes::routes,
    services::{keys::shard_path, storage_service::StorageService},
    state::AppState,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

fn app(temp: &TempDir) -> Router {
    let storage = StorageService::new(temp.path(), None);
    routes(AppState::new(storage, None, "127.0.0.1:2332".into()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "files.test")
        .body(body)
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn register(app: &Router, metadata: Value) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/storage/upload",
        Body::from(metadata.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let answer: Value = serde_json::from_slice(&body).unwrap();
    answer["UUID"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_service_info() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (status, body) = send(&app, Method::GET, "/v1/storage", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&body).unwrap();
    assert!(info["appName"].is_string());
    assert!(info["version"].is_string());
}

#[tokio::test]
async fn test_full_object_lifecycle() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/storage/upload",
        Body::from(json!({"name": "x.png", "box_key": "B1"}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let answer: Value = serde_json::from_slice(&body).unwrap();
    let key = answer["UUID"].as_str().unwrap().to_string();
    assert_eq!(key.len(), 32);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(answer["method"], "PUT");
    let href = answer["href"].as_str().unwrap();
    assert_eq!(
        href,
        format!("http://files.test/v1/storage/upload-target/{key}")
    );
    assert!(href.ends_with(&format!("/upload-target/{key}")));

    let payload = b"0123456789".to_vec();
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/v1/storage/upload-target/{key}"),
        Body::from(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/storage/download/{key}"),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(info["box_key"], "B1");
    assert_eq!(info["name"], "x.png");
    assert!(info["created_at"].as_i64().unwrap() > 0);
    assert_eq!(
        info["Url"],
        format!("http://files.test/v1/storage/download-target/{key}")
    );

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/storage/download-target/{key}"),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, payload);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/v1/storage/delete/{key}"),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"1");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/v1/storage/download/{key}"),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_upload_target_sets_etag() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);
    let key = register(&app, json!({"box_key": "B2"})).await;

    let request = Request::builder()
        .method(Method::PUT)
        .uri(format!("/v1/storage/upload-target/{key}"))
        .body(Body::from("abc"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers().get(header::ETAG).unwrap();
    assert_eq!(etag, "\"900150983cd24fb0d6963f7d28e17f72\"");
}

#[tokio::test]
async fn test_pending_download_target_is_invalid() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);
    let key = register(&app, json!({"box_key": "B1"})).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/storage/status/{key}"),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["state"], "pending");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/storage/download-target/{key}"),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["kind"], "invalid_target");
}

#[tokio::test]
async fn test_upload_to_unknown_or_short_key() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/v1/storage/upload-target/0123456789abcdef0123456789abcdef",
        Body::from("orphan"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["kind"], "invalid_target");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/v1/storage/upload-target/abc123",
        Body::from("orphan"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["kind"], "invalid_key");

    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_delete_unknown_key_succeeds() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    for _ in 0..2 {
        let (status, body) = send(
            &app,
            Method::DELETE,
            "/v1/storage/delete/0123456789abcdef0123456789abcdef",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"1");
    }
}

#[tokio::test]
async fn test_register_with_empty_or_malformed_body() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (status, _) = send(&app, Method::POST, "/v1/storage/upload", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/storage/upload",
        Body::from("{\"box_key\":"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["kind"], "invalid_metadata");
}

#[tokio::test]
async fn test_public_url_is_used_for_links() {
    let temp = TempDir::new().unwrap();
    let storage = StorageService::new(temp.path(), None);
    let app = routes(AppState::new(
        storage,
        Some("https://blobs.example.org/".into()),
        "127.0.0.1:2332".into(),
    ));

    let (_, body) = send(&app, Method::POST, "/v1/storage/upload", Body::empty()).await;
    let answer: Value = serde_json::from_slice(&body).unwrap();
    let key = answer["UUID"].as_str().unwrap();
    assert_eq!(
        answer["href"],
        format!("https://blobs.example.org/v1/storage/upload-target/{key}")
    );
}

#[tokio::test]
async fn test_health_probes() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (status, _) = send(&app, Method::GET, "/healthz", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/readyz", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let ready: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(ready["checks"]["disk"]["ok"], true);
    assert!(ready["checks"].get("mirror").is_none());
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_register_io_failure_is_internal_error() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root-is-a-file");
    std::fs::write(&root, b"occupied").unwrap();
    let storage = StorageService::new(root.clone(), None);
    let app = routes(AppState::new(storage, None, "127.0.0.1:2332".into()));

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/storage/upload",
        Body::from(json!({"box_key": "B1"}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["kind"], "internal");
    assert!(root.is_file());
}

#[tokio::test]
async fn test_delete_of_unremovable_record_is_internal_error() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);
    let key = register(&app, json!({"box_key": "B1"})).await;

    let bin_path = temp
        .path()
        .join(shard_path(&key).unwrap())
        .join(format!("{key}.bin"));
    std::fs::create_dir(&bin_path).unwrap();
    std::fs::write(bin_path.join("pinned"), b"x").unwrap();

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/v1/storage/delete/{key}"),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_ne!(body, b"1");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/storage/download/{key}"),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(info["box_key"], "B1");
}
