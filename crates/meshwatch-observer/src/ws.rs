//! `WebSocket` handler for viewers.
//!
//! Clients connect to `GET /ws` and receive every hub event as a JSON
//! text frame `{"event": "...", "data": ...}`, starting with `init` and
//! one `online` per connected reporter. The only frame a viewer may send
//! is a `console` command, which is routed to the named reporters.
//!
//! A viewer whose queue fills up is removed by the hub. Its feed then
//! ends and the socket is closed.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use meshwatch_core::Hub;
use meshwatch_types::{ViewerId, ViewerRequest};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a viewer `WebSocket`.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_viewer(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the `WebSocket` lifecycle: subscribe to the hub, forward its
/// feed, and route inbound console commands until either side closes.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.hub.subscribe_viewer().await;
    let viewer = subscription.id;
    info!(viewer = viewer.0, "Viewer connected");

    loop {
        tokio::select! {
            msg = subscription.feed.recv() => {
                let Some(msg) = msg else {
                    debug!(viewer = viewer.0, "Viewer feed closed");
                    break;
                };
                let json = match serde_json::to_string(msg.as_ref()) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!(viewer = viewer.0, error = %e, "Failed to serialize viewer event");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!(viewer = viewer.0, "Viewer disconnected (send failed)");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(viewer = viewer.0, "Viewer disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        handle_request(&state.hub, viewer, text.as_str()).await;
                    }
                    Some(Err(e)) => {
                        debug!(viewer = viewer.0, error = %e, "Viewer socket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unsubscribe_viewer(viewer).await;
    info!(viewer = viewer.0, "Viewer disconnected");
}

/// Act on one text frame from a viewer. Returns the number of reporters
/// a console command was queued for.
pub async fn handle_request(hub: &Hub, viewer: ViewerId, text: &str) -> usize {
    match serde_json::from_str::<ViewerRequest>(text) {
        Ok(ViewerRequest::Console(command)) => {
            let delivered = hub.route_command(&command).await;
            debug!(
                viewer = viewer.0,
                targets = command.dst.len(),
                delivered,
                "Routed console command"
            );
            delivered
        }
        Err(e) => {
            debug!(viewer = viewer.0, error = %e, "Ignoring viewer frame");
            0
        }
    }
}
