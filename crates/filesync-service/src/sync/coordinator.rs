//! Sync coordinator: the reconciliation operations.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use filesync_bus::ChangeBusClient;
use filesync_core::config::SyncConfig;
use filesync_core::error::AppError;
use filesync_core::events::ChangeEvent;
use filesync_core::result::AppResult;
use filesync_database::{ConflictResolution, MetadataStore};
use filesync_entity::file::{File, FileVersion, RemoteChange};
use filesync_entity::sync::SyncCheck;

use super::classify::classify_sync;
use crate::context::RequestContext;

/// Compares device state with the server, records conflict resolutions and
/// propagates changes between a user's devices.
#[derive(Clone)]
pub struct SyncCoordinator {
    /// Metadata store.
    pub(crate) store: Arc<dyn MetadataStore>,
    /// Change bus client.
    pub(crate) bus: ChangeBusClient,
    /// Sync settings.
    pub(crate) config: SyncConfig,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("bus", &self.bus)
            .finish()
    }
}

impl SyncCoordinator {
    /// Creates a new sync coordinator.
    pub fn new(store: Arc<dyn MetadataStore>, bus: ChangeBusClient, config: SyncConfig) -> Self {
        Self { store, bus, config }
    }

    /// Classify the device's copy of `file_id`, identified by `claimed_hash`.
    ///
    /// Files owned by another user report `FILE_NOT_FOUND`.
    pub async fn check_sync(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        device_id: &str,
        claimed_hash: &str,
    ) -> AppResult<SyncCheck> {
        let latest = match self.owned_file(ctx, file_id).await? {
            Some(_) => self.store.latest_version(file_id).await?,
            None => None,
        };
        let status = classify_sync(latest.as_ref(), device_id, claimed_hash);

        debug!(
            file_id = %file_id,
            device_id,
            status = %status,
            "Sync check"
        );
        Ok(SyncCheck::new(status, latest.map(|v| v.id)))
    }

    /// Every version of `file_id`, oldest first.
    pub async fn get_file_versions(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
    ) -> AppResult<Vec<FileVersion>> {
        self.require_file(ctx, file_id).await?;
        self.store.list_versions(file_id).await
    }

    /// Record a caller's conflict decision.
    ///
    /// Appends one system-originated version carrying the winner's content
    /// and marks every losing version as resolved by it. Returns the new
    /// version.
    pub async fn resolve_conflict(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        losing_version_ids: Vec<Uuid>,
        winning_version_id: Option<Uuid>,
    ) -> AppResult<FileVersion> {
        self.require_file(ctx, file_id).await?;

        let resolution = ConflictResolution {
            file_id,
            losing_version_ids,
            winning_version_id,
        };
        let version = self.store.resolve_conflict(&resolution).await?;

        info!(
            user_id = %ctx.user_id,
            file_id = %file_id,
            new_version_id = %version.id,
            version = version.version_number,
            losing = resolution.losing_version_ids.len(),
            "Conflict resolved"
        );
        Ok(version)
    }

    /// Record that a peer device changed a file.
    ///
    /// Upserts the file row and appends a contentless version; the real hash
    /// arrives with the next upload.
    pub async fn apply_remote_change(&self, event: &ChangeEvent) -> AppResult<FileVersion> {
        let change = RemoteChange {
            file_id: event.file_id,
            path: event.file_path.clone(),
            owner_id: event.origin_user_id,
            origin_device_id: event.origin_device_id.clone(),
        };
        let (_, version) = self.store.record_remote_change(&change).await?;

        debug!(
            file_id = %event.file_id,
            change_type = %event.change_type,
            origin_device_id = %event.origin_device_id,
            version = version.version_number,
            "Applied remote change"
        );
        Ok(version)
    }

    async fn owned_file(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<Option<File>> {
        Ok(self
            .store
            .find_file(file_id)
            .await?
            .filter(|file| ctx.owns(file.owner_id)))
    }

    async fn require_file(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        self.owned_file(ctx, file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }
}
