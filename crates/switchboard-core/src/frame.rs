// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire frames exchanged between bots and the relay.
//!
//! Every frame is a JSON object disambiguated by its `type` field:
//!
//! ```json
//! {"type": "register", "botId": "b1", "botName": "Bot One", "token": "secret"}
//! {"type": "registered", "success": true}
//! {"type": "ping"}
//! {"type": "pong"}
//! {"type": "chat", "id": "...", "content": "hello", "from": "api", "timestamp": 1700000000000}
//! {"type": "reply", "id": "...", "replyTo": "...", "content": "hi", "done": true, "timestamp": 1700000000000}
//! ```
//!
//! Unknown `type` values decode to an `Unknown` variant instead of failing so
//! that newer peers never crash older ones.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SwitchboardError;

/// Frames sent from a bot to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotFrame {
    /// Bind an identity to the connection the frame arrived on.
    #[serde(rename_all = "camelCase")]
    Register {
        bot_id: String,
        bot_name: String,
        #[serde(default)]
        token: String,
    },
    /// Liveness acknowledgement.
    Pong,
    /// One fragment of a reply.
    Reply(ReplyFragment),
    /// Any frame type this build does not know.
    #[serde(other)]
    Unknown,
}

/// Frames sent from the relay to a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    /// Answer to a `register` frame.
    Registered {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Liveness probe.
    Ping,
    /// Inbound request the bot should answer.
    Chat(ChatEvent),
    /// Protocol-level complaint, e.g. a frame from an unregistered connection.
    Error { message: String },
    /// Any frame type this build does not know.
    #[serde(other)]
    Unknown,
}

/// Conversation shape of a chat event.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatType {
    #[default]
    Direct,
    Group,
}

/// A request routed to a bot.
///
/// `id` is the correlation identifier the bot must echo back as `replyTo` on
/// every reply fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    pub id: String,
    pub content: String,
    pub from: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Inline image as a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_type: Option<ChatType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// One fragment of a bot's reply.
///
/// `done` is the terminal flag: it is set only on the last fragment of a
/// logical reply and is the sole completion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyFragment {
    /// Stream identifier shared by all fragments of one reply.
    pub id: String,
    /// Correlation identifier of the chat event being answered.
    pub reply_to: String,
    pub content: String,
    pub done: bool,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Serialize a frame to its JSON text form.
pub fn encode<T: Serialize>(frame: &T) -> Result<String, SwitchboardError> {
    Ok(serde_json::to_string(frame)?)
}

/// Parse a frame from JSON text.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, SwitchboardError> {
    Ok(serde_json::from_str(raw)?)
}

/// Extract the raw `type` discriminator, used to log frames that decoded as `Unknown`.
pub fn frame_type(raw: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()?
        .get("type")?
        .as_str()
        .map(str::to_owned)
}

/// Milliseconds since the Unix epoch, the timestamp unit used on the wire.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
