// Copyright 2024 Aegis Network Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Relayer handlers for HTTP/WebSocket calls

#![warn(missing_docs)]

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::prelude::*;
use tokio_stream::wrappers::ReceiverStream;

use aegis_relayer_context::RelayerContext;
use aegis_relayer_handler_utils::{ClientCommand, ServerEvent};
use aegis_relayer_sessions::{BroadcastScope, SessionId};

/// Admission rate limiting middleware.
pub mod middleware;
/// Module handling the relayer HTTP API.
pub mod routes;

/// Upgrades a request on the `/ws` route into a persistent connection.
pub async fn websocket_handler(
    State(ctx): State<Arc<RelayerContext>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move {
        if let Err(e) = accept_connection(&ctx, socket).await {
            tracing::warn!("error while handling the connection: {e}");
        }
    })
}

/// Runs one persistent connection until the client goes away.
///
/// A session is created in the registry on entry and torn down on exit;
/// tear-down synchronously leaves the role room and removes the address
/// routing entry, so no event emitted afterwards can reach this connection.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
/// * `stream` - WebSocket stream
pub async fn accept_connection(
    ctx: &RelayerContext,
    stream: WebSocket,
) -> aegis_relayer_utils::Result<()> {
    let (tx, mut rx) = stream.split();

    let (session_id, events) = ctx.sessions().connect();
    ctx.metrics.lock().await.connected_sessions.inc();

    // Everything the relay wants this session to see arrives on the
    // session's event channel; this task forwards it into the socket as
    // JSON text frames. It ends by itself once the registry drops the
    // sending half.
    let forward = ReceiverStream::new(events)
        .map(|event| {
            serde_json::to_string(&event).expect("server events serialize")
        })
        .inspect(|v| tracing::trace!("Sending: {}", v))
        .map(Message::Text)
        .map(Result::Ok)
        .forward(tx)
        .map(|result| {
            if result.is_err() {
                tracing::trace!("failed to forward event, client closed");
            }
        });
    let forward_task = tokio::spawn(forward);

    // Wait for client to send over text, such as register commands.
    while let Some(msg) = rx.next().await {
        let Ok(msg) = msg else { break };
        match msg {
            Message::Text(text) => {
                handle_text(ctx, session_id, &text).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    ctx.sessions().disconnect(session_id);
    ctx.metrics.lock().await.connected_sessions.dec();
    // The registry dropped the event sender, so the forward task drains
    // and completes on its own.
    let _ = forward_task.await;
    Ok(())
}

/// Handles one text frame from a client.
///
/// Failures here never tear the connection down: a malformed payload gets
/// an error event back, and everything else is logged and dropped. The
/// persistent channel never surfaces internal errors to clients.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
/// * `session_id` - The session this frame arrived on
/// * `text` - The text (usually in a JSON form) message to be handled.
pub async fn handle_text(
    ctx: &RelayerContext,
    session_id: SessionId,
    text: &str,
) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Register(register)) => {
            let success = ctx.sessions().register(
                session_id,
                register.address,
                register.role,
            );
            if success {
                tracing::info!(
                    session = %session_id,
                    address = %register.address,
                    role = %register.role,
                    "session registered",
                );
            }
            ctx.sessions().broadcast(
                BroadcastScope::Session(session_id),
                ServerEvent::Registered { success },
            );
        }
        Ok(ClientCommand::Ping()) => {
            ctx.sessions().broadcast(
                BroadcastScope::Session(session_id),
                ServerEvent::Pong,
            );
        }
        Err(e) => {
            tracing::warn!("Got invalid payload: {:?}", e);
            tracing::debug!("Invalid payload: {:?}", text);
            ctx.sessions().broadcast(
                BroadcastScope::Session(session_id),
                ServerEvent::Error {
                    message: e.to_string(),
                },
            );
        }
    }
}
