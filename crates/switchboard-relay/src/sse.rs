// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events (SSE) streaming for POST /v1/chat.
//!
//! When clients send Accept: text/event-stream, each reply fragment is
//! forwarded as it arrives from the bot.
//!
//! SSE event format:
//! ```text
//! event: fragment
//! data: {"text": "partial content", "done": false}
//!
//! event: complete
//! data: {"botId": "b1", "content": "full content"}
//! ```
//!
//! A failed request ends with `event: error` and `{"error": "..."}` instead
//! of `complete`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::correlation::FragmentObserver;
use crate::registry::ChatRequest;
use crate::server::RelayState;

pub const FRAGMENT_EVENT: &str = "fragment";
pub const COMPLETE_EVENT: &str = "complete";
pub const ERROR_EVENT: &str = "error";

/// Dispatch `request` to `bot_id` and stream its reply as SSE.
///
/// The dispatch runs in its own task so the stream can yield fragments
/// while the request is still pending. The stream ends after the
/// `complete` or `error` event.
pub fn stream_chat(
    state: RelayState,
    bot_id: String,
    request: ChatRequest,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel::<Event>();

    let fragment_tx = tx.clone();
    let observer: FragmentObserver = Arc::new(move |text: &str, done: bool| {
        let data = serde_json::json!({ "text": text, "done": done });
        let _ = fragment_tx.send(Event::default().event(FRAGMENT_EVENT).data(data.to_string()));
    });

    tokio::spawn(async move {
        let result = state
            .registry
            .dispatch_request(&bot_id, request, Some(observer))
            .await;
        let event = match result {
            Ok(content) => Event::default().event(COMPLETE_EVENT).data(
                serde_json::json!({ "botId": bot_id, "content": content }).to_string(),
            ),
            Err(e) => {
                tracing::warn!(%bot_id, error = %e, "streamed chat request failed");
                Event::default()
                    .event(ERROR_EVENT)
                    .data(serde_json::json!({ "error": e.to_string() }).to_string())
            }
        };
        let _ = tx.send(event);
    });

    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(event), rx))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
