//! Application state shared across all handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use filesync_bus::ChangeBusClient;
use filesync_core::config::AppConfig;
use filesync_core::traits::bus::ChangeBus;
use filesync_core::traits::storage::BlobStore;
use filesync_database::MetadataStore;
use filesync_service::{DownloadService, FileService, SyncCoordinator, UploadService};

use crate::auth::TokenVerifier;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped or cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Metadata store
    pub store: Arc<dyn MetadataStore>,
    /// Blob store
    pub blobs: Arc<dyn BlobStore>,

    /// Bearer-token verifier
    pub verifier: Arc<TokenVerifier>,

    /// Upload pipeline
    pub upload_service: Arc<UploadService>,
    /// Download pipeline
    pub download_service: Arc<DownloadService>,
    /// Metadata queries
    pub file_service: Arc<FileService>,
    /// Sync coordinator
    pub sync_coordinator: Arc<SyncCoordinator>,

    /// Cancelled on server shutdown; parent of every watch session.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the services on top of already constructed infrastructure.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        bus: Arc<dyn ChangeBus>,
    ) -> Self {
        let bus = ChangeBusClient::new(bus, &config.bus);

        let upload_service = Arc::new(UploadService::new(
            Arc::clone(&store),
            Arc::clone(&blobs),
            config.storage.clone(),
        ));
        let download_service = Arc::new(DownloadService::new(
            Arc::clone(&store),
            Arc::clone(&blobs),
            &config.sync,
        ));
        let file_service = Arc::new(FileService::new(Arc::clone(&store)));
        let sync_coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&store),
            bus,
            config.sync.clone(),
        ));

        Self {
            verifier: Arc::new(TokenVerifier::new(&config.auth)),
            config: Arc::new(config),
            store,
            blobs,
            upload_service,
            download_service,
            file_service,
            sync_coordinator,
            shutdown: CancellationToken::new(),
        }
    }
}
