//! Multi-device scenarios driven through the services directly.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use filesync_bus::{ChangeBusClient, MemoryChangeBus};
use filesync_core::config::{BusConfig, StorageConfig, SyncConfig};
use filesync_database::MemoryMetadataStore;
use filesync_entity::sync::SyncStatus;
use filesync_service::file::{UploadFrame, UploadMetadata, UploadResult};
use filesync_service::{
    DownloadService, RequestContext, SyncCoordinator, UploadService, WatchRequest,
};
use filesync_storage::MemoryBlobStore;

struct Engine {
    upload: UploadService,
    download: DownloadService,
    coordinator: SyncCoordinator,
    bus: ChangeBusClient,
    raw_bus: Arc<MemoryChangeBus>,
}

impl Engine {
    fn new() -> Self {
        let store = Arc::new(MemoryMetadataStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let raw_bus = Arc::new(MemoryChangeBus::new(64));
        let bus = ChangeBusClient::new(raw_bus.clone(), &BusConfig::default());
        let sync = SyncConfig {
            download_chunk_size_bytes: 3,
            ..SyncConfig::default()
        };
        Self {
            upload: UploadService::new(store.clone(), blobs.clone(), StorageConfig::default()),
            download: DownloadService::new(store.clone(), blobs, &sync),
            coordinator: SyncCoordinator::new(store, bus.clone(), sync),
            bus,
            raw_bus,
        }
    }

    async fn upload(
        &self,
        ctx: &RequestContext,
        device: &str,
        file_id: Option<Uuid>,
        parts: &[&'static [u8]],
    ) -> UploadResult {
        let mut frames = vec![UploadFrame::metadata(UploadMetadata {
            file_id,
            file_name: "shared/plan.txt".to_string(),
            device_id: device.to_string(),
        })];
        frames.extend(parts.iter().map(|p| UploadFrame::chunk(Bytes::from_static(*p))));
        let stream = futures::stream::iter(frames.into_iter().map(Ok::<_, std::io::Error>));
        self.upload.upload(ctx, stream).await.expect("upload")
    }

    async fn download(&self, ctx: &RequestContext, file_id: Uuid) -> Vec<u8> {
        let result = self.download.download(ctx, file_id).await.expect("download");
        let chunks: Vec<Bytes> = result
            .chunks
            .map(|c| c.expect("chunk"))
            .collect()
            .await;
        assert!(chunks.iter().all(|c| c.len() <= 3));
        chunks.concat()
    }
}

#[tokio::test]
async fn test_two_devices_diverge_and_reconcile() {
    let engine = Engine::new();
    let ctx = RequestContext::new(Uuid::new_v4());

    let v1 = engine.upload(&ctx, "A", None, &[b"draft ", b"one"]).await;
    let file_id = v1.file.id;
    let h1 = v1.version.content_hash.clone().unwrap();

    let check = engine.coordinator.check_sync(&ctx, file_id, "B", &h1).await.unwrap();
    assert_eq!(check.status, SyncStatus::Synced);

    let v2 = engine.upload(&ctx, "A", Some(file_id), &[b"draft two"]).await;
    assert_eq!(v2.version.version_number, 2);

    let b = engine.coordinator.check_sync(&ctx, file_id, "B", &h1).await.unwrap();
    assert_eq!(b.status, SyncStatus::Conflict);
    let a = engine.coordinator.check_sync(&ctx, file_id, "A", &h1).await.unwrap();
    assert_eq!(a.status, SyncStatus::NeedsUpdate);
    assert_eq!(a.latest_version_id, Some(v2.version.id));

    assert_eq!(engine.download(&ctx, file_id).await, b"draft two");

    let resolved = engine
        .coordinator
        .resolve_conflict(&ctx, file_id, vec![v1.version.id], Some(v2.version.id))
        .await
        .unwrap();
    assert_eq!(resolved.version_number, 3);
    assert_eq!(resolved.content_hash, v2.version.content_hash);

    let history = engine.coordinator.get_file_versions(&ctx, file_id).await.unwrap();
    let numbers: Vec<i32> = history.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(history[0].resolved_by, Some(resolved.id));
    assert_eq!(engine.download(&ctx, file_id).await, b"draft two");
}

#[tokio::test]
async fn test_older_winner_serves_its_own_bytes() {
    let engine = Engine::new();
    let ctx = RequestContext::new(Uuid::new_v4());

    let v1 = engine.upload(&ctx, "A", None, &[b"one"]).await;
    let file_id = v1.file.id;
    let v2 = engine.upload(&ctx, "A", Some(file_id), &[b"two"]).await;
    let h1 = v1.version.content_hash.clone().unwrap();

    let resolved = engine
        .coordinator
        .resolve_conflict(&ctx, file_id, vec![v2.version.id], Some(v1.version.id))
        .await
        .unwrap();
    assert_eq!(resolved.content_hash.as_deref(), Some(h1.as_str()));

    let check = engine.coordinator.check_sync(&ctx, file_id, "A", &h1).await.unwrap();
    assert_eq!(check.status, SyncStatus::Synced);
    assert_eq!(engine.download(&ctx, file_id).await, b"one");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_local_edit_propagates_to_peer() {
    let engine = Engine::new();
    let ctx = RequestContext::new(Uuid::new_v4());
    let topic = engine.bus.topic_for(ctx.user_id);
    let dir_a = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();

    let (tx_a, mut rx_a) = mpsc::channel(16);
    let (tx_b, mut rx_b) = mpsc::channel(16);

    let session_a = {
        let (coordinator, ctx, cancel) = (engine.coordinator.clone(), ctx.clone(), cancel.clone());
        let request = WatchRequest {
            device_id: "A".to_string(),
            folder_paths: vec![dir_a.path().to_path_buf()],
        };
        tokio::spawn(async move { coordinator.watch_file_changes(&ctx, request, tx_a, cancel).await })
    };
    let session_b = {
        let (coordinator, ctx, cancel) = (engine.coordinator.clone(), ctx.clone(), cancel.clone());
        let request = WatchRequest {
            device_id: "B".to_string(),
            folder_paths: vec![],
        };
        tokio::spawn(async move { coordinator.watch_file_changes(&ctx, request, tx_b, cancel).await })
    };

    for _ in 0..200 {
        if engine.raw_bus.group_count(&topic).await >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    tokio::fs::write(dir_a.path().join("todo.txt"), b"buy milk")
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx_b.recv())
        .await
        .expect("peer notified")
        .expect("session alive");
    assert_eq!(event.origin_device_id, "A");
    assert!(event.version_id.is_some());

    // A single write may surface as several raw events; let them settle.
    while let Ok(Some(next)) = tokio::time::timeout(Duration::from_millis(300), rx_b.recv()).await {
        assert_eq!(next.file_id, event.file_id);
    }

    // The stub recorded for the remote change has no content yet.
    let stale = engine
        .coordinator
        .check_sync(&ctx, event.file_id, "B", "anything")
        .await
        .unwrap();
    assert_eq!(stale.status, SyncStatus::Conflict);

    // Device A follows up with the real content under the same file id.
    let uploaded = engine.upload(&ctx, "A", Some(event.file_id), &[b"buy milk"]).await;
    let hash = uploaded.version.content_hash.unwrap();
    let fresh = engine
        .coordinator
        .check_sync(&ctx, event.file_id, "B", &hash)
        .await
        .unwrap();
    assert_eq!(fresh.status, SyncStatus::Synced);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx_a.try_recv().is_err());

    cancel.cancel();
    assert!(session_a.await.unwrap().is_ok());
    assert!(session_b.await.unwrap().is_ok());
}
