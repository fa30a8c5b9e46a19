//! Observe over `WebSocket`.
//!
//! `GET /ws/<path>` registers an observer for the resource at `<path>` and
//! streams every newer state as a JSON text frame:
//!
//! ```json
//! {"resource":"joystick","version":3,"value":"up"}
//! ```
//!
//! The first frame is the state at registration. Bursts may be coalesced,
//! but versions only ever increase. Closing the socket cancels the
//! observer. Paths that cannot be observed get the ordinary HTTP response
//! and no upgrade.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use hatnode_core::protocol::Request;
use hatnode_core::service::{DispatcherHandle, Observation};
use hatnode_core::state::StateChange;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::handlers::into_http;
use crate::state::AppState;

/// Register an observer and upgrade to a `WebSocket` stream.
///
/// # Route
///
/// `GET /ws/{*path}`
pub async fn observe(
    ws: WebSocketUpgrade,
    Path(path): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let dispatcher = state.dispatcher().clone();
    let reply = dispatcher.call(Request::get(path).observing()).await?;
    let Some(observation) = reply.observation else {
        return Ok(into_http(reply.response));
    };
    // Dropped with the callback if the upgrade never completes.
    let subscription = Subscription {
        dispatcher,
        observation,
    };
    Ok(ws.on_upgrade(move |socket| stream_changes(socket, subscription)))
}

/// An observer registration that is cancelled when dropped.
struct Subscription {
    dispatcher: DispatcherHandle,
    observation: Observation,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispatcher
            .cancel(self.observation.resource, self.observation.id);
    }
}

/// Encode a change as a text frame.
pub fn frame(change: &StateChange) -> Option<Message> {
    match serde_json::to_string(change) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to serialize state change: {e}");
            None
        }
    }
}

async fn send_change(socket: &mut WebSocket, change: &StateChange) -> bool {
    match frame(change) {
        Some(msg) => socket.send(msg).await.is_ok(),
        None => true,
    }
}

async fn stream_changes(mut socket: WebSocket, mut subscription: Subscription) {
    let resource = subscription.observation.resource;
    let id = subscription.observation.id;
    let stream = &mut subscription.observation.stream;
    debug!(%resource, observer = %id, "Observer connected");

    let initial = stream.latest();
    if send_change(&mut socket, &initial).await {
        loop {
            tokio::select! {
                change = stream.changed() => {
                    let Some(change) = change else {
                        debug!(%resource, observer = %id, "Observer dropped by dispatcher");
                        if let Err(e) = socket.send(Message::Close(None)).await {
                            debug!("WebSocket close failed: {e}");
                        }
                        break;
                    };
                    if !send_change(&mut socket, &change).await {
                        debug!("WebSocket client disconnected (send failed)");
                        break;
                    }
                }
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("WebSocket client disconnected");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if socket.send(Message::Pong(data)).await.is_err() {
                                debug!("WebSocket client disconnected (pong failed)");
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            debug!("WebSocket error: {e}");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    debug!(%resource, observer = %id, "Observer disconnected");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hatnode_core::state::ResourceId;
    use hatnode_core::value::{ResourceValue, SwitchPosition};

    use super::*;

    #[test]
    fn frame_is_flat_json() {
        let change = StateChange {
            resource: ResourceId::Joystick,
            version: 3,
            value: ResourceValue::Joystick(SwitchPosition::Up),
        };
        let json: serde_json::Value = match frame(&change) {
            Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            _ => serde_json::Value::Null,
        };
        assert_eq!(
            json,
            serde_json::json!({"resource": "joystick", "version": 3, "value": "up"})
        );
    }
}
