// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns a logical reply into correctly sequenced `reply` frames.
//!
//! Streaming fragments and the finishing fragment share one stream id,
//! allocated lazily on the first send and cleared by the finishing send so
//! the next reply starts fresh. Every frame carries the inbound event's id
//! as `replyTo`, which is what the relay correlates on.

use switchboard_core::frame::{now_millis, BotFrame, ReplyFragment};
use switchboard_core::{ChatEvent, SwitchboardError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::link::BotLink;

fn new_stream_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Single-shot "done driving the dispatcher" signal.
///
/// Any number of waiters are released when it is set; waiting after it is
/// set returns immediately.
#[derive(Debug, Clone, Default)]
pub struct IdleSignal(CancellationToken);

impl IdleSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_idle(&self) {
        self.0.cancel();
    }

    pub fn is_idle(&self) -> bool {
        self.0.is_cancelled()
    }

    pub async fn wait(&self) {
        self.0.cancelled().await;
    }
}

/// Reply sender for one inbound chat event.
#[derive(Debug)]
pub struct ReplyDispatcher {
    link: BotLink,
    reply_to: String,
    stream_id: Option<String>,
    idle: IdleSignal,
}

impl ReplyDispatcher {
    pub fn new(link: BotLink, reply_to: impl Into<String>) -> Self {
        Self {
            link,
            reply_to: reply_to.into(),
            stream_id: None,
            idle: IdleSignal::new(),
        }
    }

    /// Dispatcher answering `event`.
    pub fn for_event(link: BotLink, event: &ChatEvent) -> Self {
        Self::new(link, event.id.clone())
    }

    pub fn reply_to(&self) -> &str {
        &self.reply_to
    }

    /// The stream id in use, if a streamed reply is in progress.
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    /// Send a non-terminal fragment, returning the stream id it used.
    pub async fn send_fragment(&mut self, text: &str) -> Result<String, SwitchboardError> {
        let id = self.stream_id.get_or_insert_with(new_stream_id).clone();
        self.send(&id, text.to_string(), false, None).await?;
        Ok(id)
    }

    /// Send the terminal fragment of the current reply and clear the stream id.
    ///
    /// The id is cleared even if the send fails.
    pub async fn send_final(&mut self, text: &str) -> Result<String, SwitchboardError> {
        let id = self.stream_id.take().unwrap_or_else(new_stream_id);
        self.send(&id, text.to_string(), true, None).await?;
        Ok(id)
    }

    /// A whole reply delivered as one block; same framing as [`send_final`](Self::send_final).
    pub async fn send_block(&mut self, text: &str) -> Result<String, SwitchboardError> {
        self.send_final(text).await
    }

    /// Send a standalone terminal media reply under a fresh stream id.
    ///
    /// An already encoded `image` (data URL) is attached to the frame.
    /// Otherwise `media_url` is appended to the text as a link.
    pub async fn send_media(
        &self,
        text: Option<&str>,
        image: Option<String>,
        media_url: Option<&str>,
    ) -> Result<String, SwitchboardError> {
        let id = new_stream_id();
        let text = text.unwrap_or_default();
        let (content, image) = match (image, media_url) {
            (Some(image), _) => (text.to_string(), Some(image)),
            (None, Some(url)) => (format!("{text}\n\n📎 {url}").trim().to_string(), None),
            (None, None) => (text.to_string(), None),
        };
        self.send(&id, content, true, image).await?;
        Ok(id)
    }

    /// Handle to this dispatcher's idle signal.
    pub fn idle(&self) -> IdleSignal {
        self.idle.clone()
    }

    pub fn mark_idle(&self) {
        self.idle.mark_idle();
    }

    pub async fn wait_for_idle(&self) {
        self.idle.wait().await;
    }

    async fn send(
        &self,
        id: &str,
        content: String,
        done: bool,
        image: Option<String>,
    ) -> Result<(), SwitchboardError> {
        let frame = BotFrame::Reply(ReplyFragment {
            id: id.to_string(),
            reply_to: self.reply_to.clone(),
            content,
            done,
            timestamp: now_millis(),
            image,
        });
        self.link.send(&frame).await?;
        debug!(reply_to = %self.reply_to, stream_id = id, done, "reply fragment sent");
        Ok(())
    }
}
