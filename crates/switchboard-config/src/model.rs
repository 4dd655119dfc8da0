// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Switchboard.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Relay (server side) settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Bot client settings.
    #[serde(default)]
    pub bot: BotConfig,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            relay: RelayConfig::default(),
            bot: BotConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Relay configuration: listener, bot authentication, and liveness timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret bots must present when registering.
    /// `None` or an empty string disables bot authentication.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Bearer token for the HTTP API. `None` rejects every API request.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Seconds between liveness probes.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Seconds without a pong before a bot is evicted.
    #[serde(default = "default_bot_timeout_secs")]
    pub bot_timeout_secs: u64,

    /// Seconds a dispatched request may wait for its terminal fragment.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fail pending requests immediately when their bot disconnects instead
    /// of letting them run into the request timeout.
    #[serde(default)]
    pub fail_pending_on_disconnect: bool,
}

impl RelayConfig {
    /// The bot token, treating an empty string as unset.
    pub fn effective_bot_token(&self) -> Option<&str> {
        self.bot_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn bot_timeout(&self) -> Duration {
        Duration::from_secs(self.bot_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bot_token: None,
            api_token: None,
            ping_interval_secs: default_ping_interval_secs(),
            bot_timeout_secs: default_bot_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            fail_pending_on_disconnect: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    17392
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_bot_timeout_secs() -> u64 {
    90
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// Who may open a direct conversation with the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DmPolicy {
    /// Every sender is accepted.
    #[default]
    Open,
    /// Only senders listed in `allow_from` are accepted.
    Allowlist,
}

/// Bot client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Relay WebSocket URL, e.g. `ws://127.0.0.1:17392/bot-ws`.
    #[serde(default)]
    pub server_url: Option<String>,

    /// Identity the bot registers under.
    #[serde(default)]
    pub bot_id: Option<String>,

    /// Display name. Defaults to the bot id.
    #[serde(default)]
    pub bot_name: Option<String>,

    /// Shared secret presented at registration.
    #[serde(default)]
    pub token: Option<String>,

    /// Seconds to wait before reconnecting after a dropped connection.
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    /// Direct-message admission policy.
    #[serde(default)]
    pub dm_policy: DmPolicy,

    /// Sender ids admitted when `dm_policy = "allowlist"`.
    #[serde(default)]
    pub allow_from: Vec<String>,
}

impl BotConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            bot_id: None,
            bot_name: None,
            token: None,
            reconnect_interval_secs: default_reconnect_interval_secs(),
            dm_policy: DmPolicy::default(),
            allow_from: Vec::new(),
        }
    }
}

fn default_reconnect_interval_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_defaults() {
        let relay = RelayConfig::default();
        assert_eq!(relay.port, 17392);
        assert_eq!(relay.ping_interval(), Duration::from_secs(30));
        assert_eq!(relay.bot_timeout(), Duration::from_secs(90));
        assert_eq!(relay.request_timeout(), Duration::from_secs(300));
        assert!(!relay.fail_pending_on_disconnect);
        assert!(relay.effective_bot_token().is_none());
    }

    #[test]
    fn empty_bot_token_means_no_auth() {
        let relay = RelayConfig {
            bot_token: Some(String::new()),
            ..RelayConfig::default()
        };
        assert!(relay.effective_bot_token().is_none());

        let relay = RelayConfig {
            bot_token: Some("secret".into()),
            ..RelayConfig::default()
        };
        assert_eq!(relay.effective_bot_token(), Some("secret"));
    }

    #[test]
    fn bot_defaults() {
        let bot = BotConfig::default();
        assert_eq!(bot.reconnect_interval(), Duration::from_secs(5));
        assert_eq!(bot.dm_policy, DmPolicy::Open);
        assert!(bot.allow_from.is_empty());
    }

    #[test]
    fn dm_policy_is_lowercase_in_toml() {
        let bot: BotConfig = toml::from_str("dm_policy = \"allowlist\"").unwrap();
        assert_eq!(bot.dm_policy, DmPolicy::Allowlist);
    }
}
