//! Defines routes for the storage protocol.
//!
//! ## Structure
//! - `GET    /v1/storage` — service name and version
//! - `POST   /v1/storage/upload` — register metadata, receive an upload target
//! - `PUT    /v1/storage/upload-target/{key}` — push the payload
//! - `GET    /v1/storage/download/{key}` — fetch metadata
//! - `GET    /v1/storage/download-target/{key}` — fetch payload bytes
//! - `DELETE /v1/storage/delete/{key}` — remove metadata and payload
//! - `GET    /v1/storage/status/{key}` — missing / pending / complete
//!
//! Health probes are mounted at the root.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        storage_handlers::{
            delete, download, download_target, register, service_info, status, upload_target,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{delete as delete_route, get, post, put},
};

/// Build the router with shared state attached.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/v1/storage", get(service_info))
        .route("/v1/storage/upload", post(register))
        .route("/v1/storage/upload-target/{key}", put(upload_target))
        .route("/v1/storage/download/{key}", get(download))
        .route("/v1/storage/download-target/{key}", get(download_target))
        .route("/v1/storage/delete/{key}", delete_route(delete))
        .route("/v1/storage/status/{key}", get(status))
        .with_state(state)
}
