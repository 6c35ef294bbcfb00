//! Real-time events over a WebSocket
//!
//! Every connection is a subscriber. The first one to connect starts the scheduler

use axum::Extension;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;

use crate::broadcaster::Broadcaster;
use crate::scheduler::Lifecycle;

/// Upgrade to a WebSocket and stream events
///
/// Events look like:
/// ```json
/// { "event": "reminder_due", "data": [ { "id": "<uuid>", "text": "Stand up", ... } ] }
/// ```
pub async fn connect(
    Extension(broadcaster): Extension<Broadcaster>,
    Extension(lifecycle): Extension<Lifecycle>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| session(socket, broadcaster, lifecycle))
}

async fn session(mut socket: WebSocket, broadcaster: Broadcaster, lifecycle: Lifecycle) {
    // subscribe first, the very first tick should already reach this client
    let mut events = broadcaster.subscribe();

    tracing::info!("Client connected");

    lifecycle.ensure_started();

    loop {
        tokio::select! {
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!("Client connection error: {err}");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::error!("Could not serialize event: {err}");
                            continue;
                        }
                    };

                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Client lagging behind, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Client disconnected");
}
