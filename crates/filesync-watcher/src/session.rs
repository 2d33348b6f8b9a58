//! One watch session: an OS watcher, its roots and its event loop.

use std::future::Future;
use std::path::Path;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use filesync_bus::ChangeBusClient;
use filesync_core::error::{AppError, ErrorKind};
use filesync_core::events::ChangeEvent;
use filesync_core::result::AppResult;

use crate::classify::EventTranslator;
use crate::paths::WatchPaths;

type RawEvent = notify::Result<notify::Event>;

/// A filesystem watch session for one user's device.
///
/// Dropping the session stops the underlying OS watcher.
pub struct WatchSession {
    watcher: RecommendedWatcher,
    paths: WatchPaths,
    events: mpsc::Receiver<RawEvent>,
    translator: EventTranslator,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("paths", &self.paths)
            .field("translator", &self.translator)
            .finish()
    }
}

impl WatchSession {
    /// Start an OS watcher for `user_id`/`device_id` with no roots yet.
    pub fn new(
        user_id: Uuid,
        device_id: &str,
        hidden_prefix: &str,
        buffer_size: usize,
    ) -> AppResult<Self> {
        let (tx, events) = mpsc::channel(buffer_size.max(1));
        // notify delivers on its own thread, outside the runtime.
        let watcher = notify::recommended_watcher(move |res: RawEvent| {
            if tx.blocking_send(res).is_err() {
                debug!("Watch session gone, dropping raw event");
            }
        })
        .map_err(|e| {
            AppError::with_source(ErrorKind::Watcher, "Failed to start filesystem watcher", e)
        })?;

        Ok(Self {
            watcher,
            paths: WatchPaths::new(),
            events,
            translator: EventTranslator::new(user_id, device_id, hidden_prefix),
        })
    }

    /// Watch `path` recursively. Adding an already watched path is a no-op.
    pub fn add_path(&mut self, path: impl AsRef<Path>) -> AppResult<()> {
        let absolute = WatchPaths::absolute(path)?;
        if self.paths.contains(&absolute) {
            return Ok(());
        }
        self.watcher
            .watch(&absolute, RecursiveMode::Recursive)
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Watcher,
                    format!("Failed to watch {}", absolute.display()),
                    e,
                )
            })?;
        info!(path = %absolute.display(), "Watching path");
        self.paths.insert(absolute);
        Ok(())
    }

    /// Stop watching `path`. Removing an unwatched path is a no-op.
    pub fn remove_path(&mut self, path: impl AsRef<Path>) -> AppResult<()> {
        let absolute = WatchPaths::absolute(path)?;
        if !self.paths.remove(&absolute) {
            return Ok(());
        }
        if let Err(e) = self.watcher.unwatch(&absolute) {
            // The root may already be gone from disk; the OS watch died with it.
            warn!(path = %absolute.display(), error = %e, "Unwatch failed");
        }
        info!(path = %absolute.display(), "Stopped watching path");
        Ok(())
    }

    /// The roots currently watched.
    pub fn paths(&self) -> &WatchPaths {
        &self.paths
    }

    /// Publish every retained change to the bus until cancelled.
    pub async fn run(self, cancel: CancellationToken, bus: ChangeBusClient) -> AppResult<()> {
        self.run_with(cancel, move |event| {
            let bus = bus.clone();
            async move { bus.publish_change(&event).await }
        })
        .await
    }

    /// Hand every retained change to `on_change` until cancelled.
    ///
    /// Watch errors and handler errors end the session and are returned.
    pub async fn run_with<F, Fut>(mut self, cancel: CancellationToken, on_change: F) -> AppResult<()>
    where
        F: FnMut(ChangeEvent) -> Fut + Send,
        Fut: Future<Output = AppResult<()>> + Send,
    {
        let result = pump_events(&mut self.events, &self.translator, &cancel, on_change).await;
        match &result {
            Ok(()) => info!(roots = self.paths.len(), "Watch session stopped"),
            Err(e) => warn!(error = %e, "Watch session failed"),
        }
        result
    }
}

/// Drain raw notifications, translating and forwarding them in arrival order.
pub(crate) async fn pump_events<F, Fut>(
    events: &mut mpsc::Receiver<RawEvent>,
    translator: &EventTranslator,
    cancel: &CancellationToken,
    mut on_change: F,
) -> AppResult<()>
where
    F: FnMut(ChangeEvent) -> Fut + Send,
    Fut: Future<Output = AppResult<()>> + Send,
{
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            raw = events.recv() => raw,
        };

        let event = match raw {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                return Err(AppError::with_source(
                    ErrorKind::Watcher,
                    format!("Filesystem watch failed: {e}"),
                    e,
                ));
            }
            None => return Err(AppError::watcher("Filesystem watcher stopped unexpectedly")),
        };

        for change in translator.translate(&event) {
            debug!(
                path = %change.file_path,
                change_type = %change.change_type,
                "Local change detected"
            );
            on_change(change).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filesync_core::events::ChangeType;
    use notify::EventKind;
    use notify::event::{AccessKind, CreateKind, RemoveKind};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn raw(kind: EventKind, path: &str) -> RawEvent {
        Ok(notify::Event::new(kind).add_path(PathBuf::from(path)))
    }

    #[tokio::test]
    async fn test_pump_forwards_in_order_and_filters() {
        let (tx, mut rx) = mpsc::channel(8);
        let translator = EventTranslator::new(Uuid::new_v4(), "laptop", ".");
        let cancel = CancellationToken::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        tx.send(raw(EventKind::Create(CreateKind::File), "/d/a.txt")).await.unwrap();
        tx.send(raw(EventKind::Access(AccessKind::Any), "/d/a.txt")).await.unwrap();
        tx.send(raw(EventKind::Create(CreateKind::File), "/d/.a.txt.swp")).await.unwrap();
        tx.send(raw(EventKind::Remove(RemoveKind::File), "/d/a.txt")).await.unwrap();
        drop(tx);

        let sink = Arc::clone(&seen);
        let result = pump_events(&mut rx, &translator, &cancel, move |event| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(event.change_type);
                Ok(())
            }
        })
        .await;

        // The closed channel looks like a dead watcher.
        assert_eq!(result.unwrap_err().kind, ErrorKind::Watcher);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ChangeType::Created, ChangeType::Deleted]
        );
    }

    #[tokio::test]
    async fn test_watch_error_is_fatal() {
        let (tx, mut rx) = mpsc::channel(8);
        let translator = EventTranslator::new(Uuid::new_v4(), "laptop", ".");
        tx.send(Err(notify::Error::generic("inotify queue overflow")))
            .await
            .unwrap();

        let err = pump_events(&mut rx, &translator, &CancellationToken::new(), |_| async {
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Watcher);
    }

    #[tokio::test]
    async fn test_cancel_stops_cleanly() {
        let (_tx, mut rx) = mpsc::channel::<RawEvent>(8);
        let translator = EventTranslator::new(Uuid::new_v4(), "laptop", ".");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = pump_events(&mut rx, &translator, &cancel, |_| async { Ok(()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_add_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = WatchSession::new(Uuid::new_v4(), "laptop", ".", 16).unwrap();
        let err = session.add_path(dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Watcher);
        assert!(session.paths().is_empty());
    }

    #[tokio::test]
    async fn test_add_remove_paths_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = WatchSession::new(Uuid::new_v4(), "laptop", ".", 16).unwrap();

        session.add_path(dir.path()).unwrap();
        session.add_path(dir.path()).unwrap();
        assert_eq!(session.paths().len(), 1);

        session.remove_path(dir.path()).unwrap();
        session.remove_path(dir.path()).unwrap();
        session.remove_path("/never/watched").unwrap();
        assert!(session.paths().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_real_file_creation_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = WatchSession::new(Uuid::new_v4(), "laptop", ".", 64).unwrap();
        session.add_path(dir.path()).unwrap();

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(64);
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(session.run_with(run_cancel, move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event).await;
                Ok(())
            }
        }));

        tokio::fs::write(dir.path().join(".hidden"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("visible.txt"), b"hello").await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");
        assert!(event.file_path.ends_with("visible.txt"));

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }
}
