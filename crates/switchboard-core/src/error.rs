// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard relay and bot client.

use thiserror::Error;

/// The primary error type surfaced by registry, dispatch, and monitor operations.
///
/// Request-specific outcomes (`AuthRejected`, `NotFound`, `RequestTimeout`,
/// `ConnectionClosed`) are returned to the immediate caller. Transport and
/// protocol failures are normally handled where they occur and only reach a
/// caller when that caller asked to send something.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Registration carried a token that does not match the relay's shared secret.
    #[error("registration rejected for bot {bot_id}: invalid token")]
    AuthRejected { bot_id: String },

    /// A request was dispatched to an identity that is not registered.
    #[error("bot not found: {bot_id}")]
    NotFound { bot_id: String },

    /// No terminal fragment arrived before the request deadline.
    #[error("request timed out after {duration:?}")]
    RequestTimeout { duration: std::time::Duration },

    /// The target bot disconnected while the request was still pending.
    #[error("connection to bot {bot_id} closed before the reply completed")]
    ConnectionClosed { bot_id: String },

    /// Send or receive failure on a connection.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for SwitchboardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
