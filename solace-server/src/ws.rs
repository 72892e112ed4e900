//! solace-server/src/ws.rs
//!
//! WebSocket transport. One writer task drains the connection's outbound queue; the
//! reader loop hands frames to the gateway one at a time, which keeps a sender's
//! events in order.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use solace_common::models::identity::Identity;
use solace_common::models::realtime::ServerEvent;

use crate::auth::AuthenticatedUser;
use crate::context::AppState;

/// Identity is checked before the upgrade is looked at, so a missing header is a 401
/// even for a well-formed handshake.
pub async fn upgrade(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let ctx = state.gateway.connect(identity, tx).await;

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to encode {}: {}", event.name(), e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => state.gateway.handle_frame(&ctx, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(other) => trace!("Ignoring non-text frame on {}: {:?}", ctx.id, other),
            Err(e) => {
                debug!("Socket {} read error: {}", ctx.id, e);
                break;
            }
        }
    }

    // Unregistering drops the last sender, which ends the writer loop.
    state.gateway.disconnect(&ctx).await;
    let _ = writer.await;
}
