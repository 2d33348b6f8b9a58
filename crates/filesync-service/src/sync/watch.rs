//! Watch sessions: local filesystem watching plus inbound change propagation.

use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use filesync_bus::ChangeBusClient;
use filesync_core::error::AppError;
use filesync_core::events::ChangeEvent;
use filesync_core::result::AppResult;
use filesync_watcher::WatchSession;

use super::coordinator::SyncCoordinator;
use crate::context::RequestContext;

/// Parameters of a watch call.
#[derive(Debug, Clone)]
pub struct WatchRequest {
    /// The watching device.
    pub device_id: String,
    /// Local roots to watch for changes made on this device.
    pub folder_paths: Vec<PathBuf>,
}

impl SyncCoordinator {
    /// Run a watch session until `cancel` fires or the session fails.
    ///
    /// Two activities run together: the filesystem watcher publishing this
    /// device's local changes, and a bus subscription on a consumer group of
    /// its own. Events that originated on `device_id` are dropped; all others
    /// are applied with [`apply_remote_change`](Self::apply_remote_change) and
    /// sent to `outbound`. When either activity stops, both stop. A closed
    /// `outbound` ends the session with a `Transport` error.
    pub async fn watch_file_changes(
        &self,
        ctx: &RequestContext,
        request: WatchRequest,
        outbound: mpsc::Sender<ChangeEvent>,
        cancel: CancellationToken,
    ) -> AppResult<()> {
        if request.device_id.trim().is_empty() {
            return Err(AppError::validation("device_id must not be empty"));
        }

        let user_id = ctx.user_id;
        let device_id = request.device_id;

        let mut session = WatchSession::new(
            user_id,
            &device_id,
            &self.config.hidden_file_prefix,
            self.config.watch_buffer_size,
        )?;
        for path in &request.folder_paths {
            session.add_path(path)?;
        }

        let group = ChangeBusClient::session_group(
            &self.config.consumer_group_prefix,
            user_id,
            &device_id,
            Utc::now(),
        );
        info!(
            user_id = %user_id,
            device_id = %device_id,
            group = %group,
            roots = session.paths().len(),
            "Watch session started"
        );

        let session_cancel = cancel.child_token();

        let local = {
            let token = session_cancel.clone();
            let bus = self.bus.clone();
            async move {
                let result = session.run(token.clone(), bus).await;
                token.cancel();
                result
            }
        };

        let remote = {
            let token = session_cancel.clone();
            let coordinator = self.clone();
            let device_id = device_id.clone();
            let group = group.clone();
            async move {
                let result = self
                    .bus
                    .subscribe_changes(&group, user_id, token.clone(), move |event| {
                        let coordinator = coordinator.clone();
                        let outbound = outbound.clone();
                        let device_id = device_id.clone();
                        async move { coordinator.forward_remote(&device_id, event, &outbound).await }
                    })
                    .await;
                token.cancel();
                result
            }
        };

        let (local, remote) = tokio::join!(local, remote);
        let result = local.and(remote);
        match &result {
            Ok(()) => info!(user_id = %user_id, device_id = %device_id, "Watch session ended"),
            Err(e) => warn!(
                user_id = %user_id,
                device_id = %device_id,
                error = %e,
                "Watch session terminated"
            ),
        }
        result
    }

    async fn forward_remote(
        &self,
        device_id: &str,
        event: ChangeEvent,
        outbound: &mpsc::Sender<ChangeEvent>,
    ) -> AppResult<()> {
        if event.is_from_device(device_id) {
            debug!(file_id = %event.file_id, device_id, "Suppressed echo of own change");
            return Ok(());
        }

        let stub = self.apply_remote_change(&event).await?;
        outbound
            .send(event.with_version(stub.id))
            .await
            .map_err(|_| AppError::transport("Watch stream closed by the client"))
    }
}
