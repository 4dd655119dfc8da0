// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic ping/pong sweep that prunes silent bots.
//!
//! A bot is evicted once its last pong is older than the staleness
//! threshold, whether or not its socket ever reported an error.

use std::sync::Arc;
use std::time::Duration;

use switchboard_config::RelayConfig;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::BotRegistry;

/// Liveness timing.
#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    pub ping_interval: Duration,
    /// Maximum silence before a bot is evicted.
    pub bot_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            bot_timeout: Duration::from_secs(90),
        }
    }
}

impl From<&RelayConfig> for LivenessConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            bot_timeout: config.bot_timeout(),
        }
    }
}

/// One liveness tick: probe every bot, then evict the stale ones.
///
/// Returns the evicted bot ids.
pub fn sweep(registry: &BotRegistry, bot_timeout: Duration) -> Vec<String> {
    let pinged = registry.ping_all();
    let evicted = registry.evict_stale(bot_timeout);
    debug!(pinged, evicted = evicted.len(), "liveness sweep");
    evicted
}

/// Run the liveness loop until `cancel` fires.
///
/// The first sweep happens one full interval after start. A zero
/// `ping_interval` falls back to the default period.
pub async fn run_liveness(
    registry: Arc<BotRegistry>,
    config: LivenessConfig,
    cancel: CancellationToken,
) {
    let period = if config.ping_interval.is_zero() {
        let fallback = LivenessConfig::default().ping_interval;
        warn!(?fallback, "ping interval is zero, using the default");
        fallback
    } else {
        config.ping_interval
    };
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(?period, bot_timeout = ?config.bot_timeout, "liveness monitor started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep(&registry, config.bot_timeout);
            }
            () = cancel.cancelled() => {
                info!("liveness monitor stopped");
                return;
            }
        }
    }
}
