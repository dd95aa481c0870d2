//! Server context shared by all request handlers.

use crate::services::storage_service::StorageService;
use axum::http::{HeaderMap, header};

/// Built once at startup and cloned into each handler by axum.
#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,

    /// Externally visible base URL (`http://host:port`) used for the links
    /// handed to clients. When unset, links are built from the request's
    /// `Host` header.
    pub public_url: Option<String>,

    /// Bind address, the last resort when neither of the above is available.
    pub fallback_host: String,
}

impl AppState {
    pub fn new(storage: StorageService, public_url: Option<String>, fallback_host: String) -> Self {
        Self {
            storage,
            public_url: public_url.map(|url| url.trim_end_matches('/').to_string()),
            fallback_host,
        }
    }

    /// Base URL for links returned in response to a request with `headers`.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(&self.fallback_host);
        format!("http://{host}")
    }
}
