// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration probe for the bot client.

use serde::Serialize;
use switchboard_config::BotConfig;

/// Outcome of [`probe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report whether the bot has enough configuration to connect.
///
/// Only checks configuration; no connection is attempted.
pub fn probe(config: &BotConfig) -> ProbeResult {
    let server_url = config.server_url.as_deref().filter(|s| !s.trim().is_empty());
    let bot_id = config.bot_id.as_deref().filter(|s| !s.trim().is_empty());

    match (server_url, bot_id) {
        (Some(_), Some(bot_id)) => ProbeResult {
            ok: true,
            bot_id: Some(bot_id.to_string()),
            bot_name: config.bot_name.clone(),
            error: None,
        },
        _ => ProbeResult {
            ok: false,
            bot_id: None,
            bot_name: None,
            error: Some("bot not configured (server_url and bot_id required)".to_string()),
        },
    }
}
