//! HTTP handlers for the two-phase upload protocol.
//! Payload bodies are streamed in both directions; record handling is
//! delegated to `StorageService`.

use crate::{
    errors::AppError,
    models::{file_info::FileInfo, object_state::ObjectState},
    services::storage_service::StorageError,
    state::AppState,
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Serialize;
use std::io;
use tokio_util::io::ReaderStream;

pub const APP_NAME: &str = "Blob storage files";
pub const API_VERSION: &str = "1.0";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub app_name: &'static str,
    pub version: &'static str,
}

/// Response to a registration: where and how to send the payload.
#[derive(Serialize)]
pub struct UploadTarget {
    #[serde(rename = "UUID")]
    pub uuid: String,
    pub href: String,
    pub method: &'static str,
}

#[derive(Serialize)]
pub struct StatusReport {
    #[serde(rename = "UUID")]
    pub uuid: String,
    pub state: ObjectState,
}

/// `GET /v1/storage`
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        app_name: APP_NAME,
        version: API_VERSION,
    })
}

/// `POST /v1/storage/upload` — phase one.
///
/// The body is JSON metadata; `Content-Type` is not enforced and an empty body
/// registers default metadata.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadTarget>, AppError> {
    let info = if body.iter().all(u8::is_ascii_whitespace) {
        FileInfo::default()
    } else {
        serde_json::from_slice::<FileInfo>(&body)
            .map_err(|err| StorageError::InvalidMetadata(err.to_string()))?
    };

    let registration = state.storage.register(info).await?;
    let href = format!(
        "{}/v1/storage/upload-target/{}",
        state.base_url(&headers),
        registration.key
    );

    Ok(Json(UploadTarget {
        uuid: registration.key,
        href,
        method: "PUT",
    }))
}

/// `PUT /v1/storage/upload-target/{key}` — phase two.
pub async fn upload_target(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Body,
) -> Result<Response, AppError> {
    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let receipt = state.storage.accept_payload_stream(&key, stream).await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", receipt.etag)) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// `GET /v1/storage/download/{key}` — metadata with a resolved download link.
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<FileInfo>, AppError> {
    let mut info = state.storage.read_metadata(&key).await?;
    info.url = Some(format!(
        "{}/v1/storage/download-target/{}",
        state.base_url(&headers),
        key
    ));
    Ok(Json(info))
}

/// `GET /v1/storage/download-target/{key}` — payload bytes as a stream.
pub async fn download_target(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (file, len) = state.storage.payload_reader(&key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    Ok(response)
}

/// `DELETE /v1/storage/delete/{key}`
pub async fn delete(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.storage.delete(&key).await?;
    Ok("1")
}

/// `GET /v1/storage/status/{key}`
pub async fn status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<StatusReport>, AppError> {
    let object_state = state.storage.state(&key).await?;
    Ok(Json(StatusReport {
        uuid: key,
        state: object_state,
    }))
}
