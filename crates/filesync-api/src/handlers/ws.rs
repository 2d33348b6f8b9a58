//! WebSocket transport for watch sessions.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum_extra::extract::Query;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use filesync_service::{RequestContext, WatchRequest};

use crate::dto::request::{WatchQuery, validate};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/sync/watch?device_id=...&folder=...&folder=... (WebSocket upgrade)
///
/// Every remote change for the caller is sent as a JSON text message.
/// Closing the socket ends the session.
pub async fn watch_changes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<WatchQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    validate(&query)?;
    let request = WatchRequest {
        device_id: query.device_id,
        folder_paths: query.folder.into_iter().map(PathBuf::from).collect(),
    };
    let ctx = auth.0;
    Ok(ws.on_upgrade(move |socket| run_watch_socket(state, ctx, request, socket)))
}

async fn run_watch_socket(
    state: AppState,
    ctx: RequestContext,
    request: WatchRequest,
    socket: WebSocket,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut events) = mpsc::channel(state.config.sync.watch_buffer_size.max(1));
    let cancel = state.shutdown.child_token();
    let device_id = request.device_id.clone();

    info!(user_id = %ctx.user_id, device_id = %device_id, "Watch socket opened");

    let mut session = {
        let coordinator = Arc::clone(&state.sync_coordinator);
        let cancel = cancel.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            coordinator
                .watch_file_changes(&ctx, request, tx, cancel)
                .await
        })
    };

    // `Some` when the session ended on its own, `None` when the socket did.
    let finished = loop {
        tokio::select! {
            joined = &mut session => break Some(joined),
            event = events.recv() => {
                let Some(event) = event else {
                    break Some((&mut session).await);
                };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode change event");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break None;
                }
            }
            inbound = ws_rx.next() => match inbound {
                None | Some(Ok(Message::Close(_))) => break None,
                Some(Err(e)) => {
                    warn!(user_id = %ctx.user_id, error = %e, "Watch socket error");
                    break None;
                }
                Some(Ok(_)) => {}
            },
        }
    };

    let outcome = match finished {
        Some(joined) => joined,
        None => {
            drop(events);
            cancel.cancel();
            session.await
        }
    };

    match outcome {
        Ok(Ok(())) => {
            let _ = ws_tx.send(Message::Close(None)).await;
        }
        Ok(Err(e)) => {
            warn!(user_id = %ctx.user_id, device_id = %device_id, error = %e, "Watch session failed");
            let frame = CloseFrame {
                code: close_code::ERROR,
                reason: e.message.clone().into(),
            };
            let _ = ws_tx.send(Message::Close(Some(frame))).await;
        }
        Err(e) => warn!(error = %e, "Watch session task panicked"),
    }

    info!(user_id = %ctx.user_id, device_id = %device_id, "Watch socket closed");
}
