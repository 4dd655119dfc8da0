// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero intervals and well-formed relay URLs.

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        fail(format!(
            "log_level `{}` must be one of {}",
            config.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    let relay = &config.relay;
    if relay.host.trim().is_empty() {
        fail("relay.host must not be empty".to_string());
    }
    if relay.ping_interval_secs == 0 {
        fail("relay.ping_interval_secs must be greater than zero".to_string());
    }
    if relay.request_timeout_secs == 0 {
        fail("relay.request_timeout_secs must be greater than zero".to_string());
    }
    if relay.bot_timeout_secs < relay.ping_interval_secs {
        fail(format!(
            "relay.bot_timeout_secs ({}) must be at least relay.ping_interval_secs ({})",
            relay.bot_timeout_secs, relay.ping_interval_secs
        ));
    }

    let bot = &config.bot;
    if let Some(url) = &bot.server_url
        && !(url.starts_with("ws://") || url.starts_with("wss://"))
    {
        fail(format!(
            "bot.server_url `{url}` must start with ws:// or wss://"
        ));
    }
    if let Some(id) = &bot.bot_id
        && id.trim().is_empty()
    {
        fail("bot.bot_id must not be blank".to_string());
    }
    if bot.reconnect_interval_secs == 0 {
        fail("bot.reconnect_interval_secs must be greater than zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
