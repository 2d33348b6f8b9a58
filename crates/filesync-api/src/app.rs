//! Application builder: wires infrastructure, services, router and
//! middleware into a running server.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use filesync_core::config::AppConfig;
use filesync_core::error::{AppError, ErrorKind};
use filesync_database::{DatabasePool, FileRepository, MemoryMetadataStore, MetadataStore};

use crate::middleware::cors::build_cors_layer;
use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server);
    build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Construct the metadata store, blob store and change bus named by
/// `config`, then the services on top of them.
pub async fn build_state(config: AppConfig) -> Result<AppState, AppError> {
    let store: Arc<dyn MetadataStore> = if config.database.is_memory() {
        warn!("Using the in-memory metadata store; nothing survives a restart");
        Arc::new(MemoryMetadataStore::new())
    } else {
        let db = DatabasePool::connect(&config.database).await?;
        filesync_database::migration::run_migrations(&db.pool()).await?;
        Arc::new(FileRepository::new(db.pool()))
    };

    let blobs = filesync_storage::build_blob_store(&config.storage).await?;
    let bus = filesync_bus::build_change_bus(&config.bus).await?;

    Ok(AppState::new(config, store, blobs, bus))
}

/// Runs the FileSync server until Ctrl+C or SIGTERM.
///
/// On shutdown every open watch session is cancelled; connections still open
/// after `server.shutdown_grace_seconds` are dropped.
pub async fn run_server(config: AppConfig) -> Result<(), AppError> {
    info!("Starting FileSync server...");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let state = build_state(config).await?;
    let shutdown = state.shutdown.clone();
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Internal, format!("Failed to bind {addr}"), e)
    })?;
    info!(addr = %addr, "FileSync server listening");

    let signal = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, closing watch sessions");
        signal.cancel();
    });

    let deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server.into_future() => result.map_err(|e| {
            AppError::with_source(ErrorKind::Internal, "Server error", e)
        })?,
        () = deadline => warn!(
            grace_seconds = grace.as_secs(),
            "Connections still open after the grace period, exiting"
        ),
    }

    info!("FileSync server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
