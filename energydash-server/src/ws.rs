// EnergyDash Server - HTTP and WebSocket surface
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! WebSocket push channel
//!
//! Each connection becomes one hub subscriber. Published notifications are
//! forwarded as text frames; anything the client sends is ignored apart
//! from close frames. The subscriber is removed when either side stops.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::state::AppState;

pub async fn notifications_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state))
}

async fn serve_subscriber(socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.hub.subscribe();
    let id = subscription.id;
    let (mut sink, mut stream) = socket.split();

    let mut forward = tokio::spawn(async move {
        while let Some(payload) = subscription.recv().await {
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let mut listen = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => listen.abort(),
        _ = &mut listen => forward.abort(),
    }

    state.hub.unsubscribe(id);
    debug!("WebSocket subscriber {} closed", id);
}
