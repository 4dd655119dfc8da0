// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot-facing WebSocket endpoint.
//!
//! Bot -> Relay (JSON):
//! ```json
//! {"type": "register", "botId": "b1", "botName": "Bot One", "token": "secret"}
//! {"type": "pong"}
//! {"type": "reply", "id": "s1", "replyTo": "<correlation id>", "content": "hi", "done": false, "timestamp": 0}
//! ```
//!
//! Relay -> Bot (JSON):
//! ```json
//! {"type": "registered", "success": true}
//! {"type": "ping"}
//! {"type": "chat", "id": "<correlation id>", "content": "hello", "from": "api", "timestamp": 0}
//! {"type": "error", "message": "Not registered"}
//! ```

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use switchboard_core::frame::{self, BotFrame, RelayFrame};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::connection::{ConnectionHandle, OUTBOUND_QUEUE};
use crate::registry::BotRegistry;
use crate::server::RelayState;

/// How long the writer may keep flushing after the reader has finished.
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Sent to connections that talk before registering.
pub const NOT_REGISTERED: &str = "Not registered";

/// WebSocket upgrade handler for bots.
pub async fn bot_ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one bot connection until either side closes it.
///
/// Spawns a writer task that drains the connection's outbound queue onto the
/// socket, then reads inbound frames and routes them through the registry.
async fn handle_socket(socket: WebSocket, state: RelayState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (handle, rx) = ConnectionHandle::channel(OUTBOUND_QUEUE);
    let conn_id = handle.id().clone();
    debug!(%conn_id, "bot socket opened");

    let mut writer = tokio::spawn(write_loop(ws_sender, rx, handle.clone()));

    loop {
        tokio::select! {
            () = handle.closed() => break,
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    route_frame(&state.registry, &handle, text.as_str());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // Binary and control frames; ping/pong is handled by the WebSocket layer.
                Some(Err(e)) => {
                    error!(%conn_id, error = %e, "bot socket read failed");
                    break;
                }
            },
        }
    }

    handle.close();
    state.registry.unregister_connection(&conn_id);
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    debug!(%conn_id, "bot socket closed");
}

/// Forward queued frames to the socket in order.
///
/// On close, frames already queued are flushed before the close frame.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    handle: ConnectionHandle,
) {
    loop {
        tokio::select! {
            biased;
            next = rx.recv() => match next {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        error!(conn_id = %handle.id(), error = %e, "bot socket write failed");
                        handle.close();
                        return;
                    }
                }
                None => break,
            },
            () = handle.closed() => break,
        }
    }

    while let Ok(text) = rx.try_recv() {
        if sink.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Handle one text frame received on `handle`.
///
/// Registration binds an identity to the connection; every other known
/// frame needs that identity and is answered with an error frame without it.
pub fn route_frame(registry: &BotRegistry, handle: &ConnectionHandle, raw: &str) {
    let frame: BotFrame = match frame::decode(raw) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(conn_id = %handle.id(), error = %e, "dropping malformed bot frame");
            return;
        }
    };

    match frame {
        BotFrame::Register {
            bot_id,
            bot_name,
            token,
        } => {
            let ack = match registry.register(handle, &bot_id, &bot_name, Some(&token)) {
                Ok(()) => RelayFrame::Registered {
                    success: true,
                    error: None,
                },
                Err(e) => RelayFrame::Registered {
                    success: false,
                    error: Some(e.to_string()),
                },
            };
            reply(handle, &ack);
        }
        BotFrame::Pong => {
            if let Some(bot_id) = identity_or_reject(registry, handle) {
                registry.mark_alive(&bot_id);
            }
        }
        BotFrame::Reply(fragment) => {
            if let Some(bot_id) = identity_or_reject(registry, handle) {
                registry.record_fragment(
                    &bot_id,
                    &fragment.reply_to,
                    &fragment.content,
                    fragment.done,
                );
            }
        }
        BotFrame::Unknown => {
            debug!(
                conn_id = %handle.id(),
                frame_type = frame::frame_type(raw).as_deref().unwrap_or("<none>"),
                "ignoring unknown bot frame"
            );
        }
    }
}

fn identity_or_reject(registry: &BotRegistry, handle: &ConnectionHandle) -> Option<String> {
    let identity = registry.find_identity(handle.id());
    if identity.is_none() {
        reply(
            handle,
            &RelayFrame::Error {
                message: NOT_REGISTERED.to_string(),
            },
        );
    }
    identity
}

fn reply(handle: &ConnectionHandle, frame: &RelayFrame) {
    if let Err(e) = handle.send(frame) {
        warn!(conn_id = %handle.id(), error = %e, "failed to answer bot");
    }
}
