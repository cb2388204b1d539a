//! WebSocket stream of fleet snapshots.
//!
//! Each connection registers a subscriber queue with the registry. The
//! collection loop's broadcaster fills the queue; this task drains it onto
//! the socket. Inbound frames are read only to notice a close.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use fleetwatch_state::Registry;
use tracing::{debug, info};

use crate::ApiState;

/// GET /ws/metrics
pub async fn metrics_stream(State(state): State<ApiState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stream_snapshots(socket, state.registry))
}

async fn stream_snapshots(socket: WebSocket, registry: Registry) {
    let subscribers = registry.subscribers().clone();
    let mut subscription = subscribers.subscribe().await;
    let id = subscription.id();
    info!(subscriber = id, "stream subscriber connected");

    let (mut sink, mut inbound) = socket.split();
    loop {
        tokio::select! {
            next = subscription.recv() => match next {
                Some(payload) => {
                    if sink.send(Message::Text(payload.as_ref().into())).await.is_err() {
                        break;
                    }
                }
                // Queue closed: the server is shutting down.
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = inbound.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    subscribers.unsubscribe(id).await;
    debug!(subscriber = id, "stream subscriber disconnected");
}
