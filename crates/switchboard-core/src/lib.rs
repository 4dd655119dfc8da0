// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard bot relay.
//!
//! This crate provides the error taxonomy, the JSON wire frames, and the
//! small set of types shared by the relay (`switchboard-relay`) and the
//! bot-side client (`switchboard-bot`).

pub mod error;
pub mod frame;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SwitchboardError;
pub use frame::{BotFrame, ChatEvent, ChatType, RelayFrame, ReplyFragment};
pub use types::{BotInfo, ConnectionId};
