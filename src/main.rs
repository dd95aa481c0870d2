use anyhow::{Context, Result};
use blob_store::{
    config::AppConfig,
    routes,
    services::{mirror::MetadataMirror, storage_service::StorageService},
    state::AppState,
};
use std::{io::ErrorKind, path::Path};
use tokio::{fs, net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting blob-store with config: {:?}", cfg);

    // --- Handle migration mode ---
    if migrate {
        let Some(db_url) = cfg.database_url.as_deref() else {
            anyhow::bail!("--migrate requires a database URL");
        };
        connect_mirror(db_url).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Optional metadata mirror (best effort) ---
    let mirror = match cfg.database_url.as_deref() {
        Some(db_url) => match connect_mirror(db_url).await {
            Ok(mirror) => Some(mirror),
            Err(err) => {
                tracing::warn!("Metadata mirror unavailable, continuing without it: {:#}", err);
                None
            }
        },
        None => None,
    };

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)
            .await
            .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize core service ---
    let storage = StorageService::new(cfg.storage_dir.clone(), mirror);
    let state = AppState::new(storage, cfg.public_url.clone(), cfg.addr());

    // --- Build router ---
    let app = routes::routes::routes(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Connect to the mirror database and apply its schema.
async fn connect_mirror(db_url: &str) -> Result<MetadataMirror> {
    tracing::debug!("Connecting metadata mirror => {}", db_url);

    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if !db_path.contains(":memory:") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
    }

    let url = if db_url.contains('?') || db_path.contains(":memory:") {
        db_url.to_string()
    } else {
        format!("{}?mode=rwc", db_url)
    };
    let mirror = MetadataMirror::connect(&url)
        .await
        .with_context(|| format!("connecting to {}", db_url))?;
    mirror.init().await?;
    Ok(mirror)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
