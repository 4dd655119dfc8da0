// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot-initiated messages and conversation target helpers.

use std::sync::LazyLock;

use regex::Regex;
use switchboard_core::frame::{now_millis, BotFrame, ReplyFragment};
use switchboard_core::SwitchboardError;

use crate::link::BotLink;

static TARGET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(user|conv|gateway|group):").unwrap());

/// Ids of a message sent with [`send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub message_id: String,
    pub conversation_id: String,
}

/// Send a standalone terminal message to conversation `to`.
///
/// Without `reply_to`, the frame carries the placeholder `outbound-<id>`,
/// which the relay logs as an unknown reply.
pub async fn send_message(
    link: &BotLink,
    to: &str,
    text: &str,
    reply_to: Option<&str>,
) -> Result<SendResult, SwitchboardError> {
    send_outbound(link, to, text.to_string(), None, reply_to).await
}

/// Send an already encoded image (data URL) to conversation `to`.
pub async fn send_image(
    link: &BotLink,
    to: &str,
    image: String,
    reply_to: Option<&str>,
) -> Result<SendResult, SwitchboardError> {
    send_outbound(link, to, String::new(), Some(image), reply_to).await
}

async fn send_outbound(
    link: &BotLink,
    to: &str,
    content: String,
    image: Option<String>,
    reply_to: Option<&str>,
) -> Result<SendResult, SwitchboardError> {
    let message_id = uuid::Uuid::new_v4().to_string();
    let reply_to = reply_to
        .map(str::to_string)
        .unwrap_or_else(|| format!("outbound-{message_id}"));

    link.send(&BotFrame::Reply(ReplyFragment {
        id: message_id.clone(),
        reply_to,
        content,
        done: true,
        timestamp: now_millis(),
        image,
    }))
    .await?;

    Ok(SendResult {
        message_id,
        conversation_id: normalize_target(to),
    })
}

/// Strip a `user:`, `conv:`, `gateway:` or `group:` prefix (any case) and trim.
pub fn normalize_target(target: &str) -> String {
    TARGET_PREFIX.replace(target, "").trim().to_string()
}

/// Canonical `conv:<id>` form of a target.
pub fn format_target(target: &str) -> String {
    format!("conv:{}", normalize_target(target))
}

/// Any non-blank string is a usable id.
pub fn looks_like_id(id: &str) -> bool {
    !id.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use switchboard_core::frame;

    use super::*;

    fn reply(raw: &str) -> ReplyFragment {
        match frame::decode::<BotFrame>(raw).unwrap() {
            BotFrame::Reply(fragment) => fragment,
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn normalize_strips_known_prefixes() {
        assert_eq!(normalize_target("user:alice"), "alice");
        assert_eq!(normalize_target("CONV: room-1 "), "room-1");
        assert_eq!(normalize_target("Gateway:x"), "x");
        assert_eq!(normalize_target("group:g"), "g");
        assert_eq!(normalize_target("chat:keep"), "chat:keep");
        assert_eq!(normalize_target("  plain  "), "plain");
    }

    #[test]
    fn format_and_id_check() {
        assert_eq!(format_target("user:alice"), "conv:alice");
        assert!(looks_like_id("a"));
        assert!(!looks_like_id("   "));
        assert!(!looks_like_id(""));
    }

    #[tokio::test]
    async fn outbound_message_uses_placeholder_reply_to() {
        let (link, mut rx) = BotLink::channel(4);
        let result = send_message(&link, "user:alice", "hello", None)
            .await
            .unwrap();
        assert_eq!(result.conversation_id, "alice");

        let fragment = reply(&rx.recv().await.unwrap());
        assert_eq!(fragment.id, result.message_id);
        assert_eq!(fragment.reply_to, format!("outbound-{}", result.message_id));
        assert!(fragment.done);
    }

    #[tokio::test]
    async fn explicit_reply_to_is_kept() {
        let (link, mut rx) = BotLink::channel(4);
        send_message(&link, "alice", "hi", Some("req-9")).await.unwrap();
        assert_eq!(reply(&rx.recv().await.unwrap()).reply_to, "req-9");
    }

    #[tokio::test]
    async fn image_message_has_empty_text() {
        let (link, mut rx) = BotLink::channel(4);
        send_image(&link, "alice", "data:image/png;base64,AA==".into(), None)
            .await
            .unwrap();
        let fragment = reply(&rx.recv().await.unwrap());
        assert_eq!(fragment.content, "");
        assert_eq!(fragment.image.as_deref(), Some("data:image/png;base64,AA=="));
    }

    #[tokio::test]
    async fn closed_link_is_a_transport_error() {
        let (link, _rx) = BotLink::channel(4);
        link.close();
        let err = send_message(&link, "alice", "hi", None).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Transport { .. }));
    }
}
