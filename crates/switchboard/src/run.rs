// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve`, `switchboard bot` and `switchboard probe`.

use switchboard_bot::{probe, start_monitor, EchoHandler};
use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;
use switchboard_relay::Relay;
use tracing::info;

use crate::shutdown;

/// Run the relay until SIGINT or SIGTERM.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.log_level);
    let cancel = shutdown::install_signal_handler();

    info!(host = %config.relay.host, port = config.relay.port, "starting relay");
    let relay = Relay::new(config.relay);
    relay.run(cancel).await
}

/// Run the echo bot against the configured relay until SIGINT or SIGTERM.
pub async fn run_bot(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.log_level);
    let cancel = shutdown::install_signal_handler();
    start_monitor(&config.bot, EchoHandler, cancel).await
}

/// Print the bot probe as JSON. Fails when the bot is not configured.
pub fn run_probe(config: &SwitchboardConfig) -> Result<(), SwitchboardError> {
    let result = probe(&config.bot);
    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.ok {
        Ok(())
    } else {
        Err(SwitchboardError::Config(
            result.error.unwrap_or_else(|| "bot not configured".to_string()),
        ))
    }
}

/// Initialize the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_fails_without_bot_section() {
        let err = run_probe(&SwitchboardConfig::default()).unwrap_err();
        assert!(matches!(err, SwitchboardError::Config(_)));
    }

    #[test]
    fn probe_passes_with_bot_section() {
        let config = switchboard_config::load_and_validate_str(
            r#"
[bot]
server_url = "ws://127.0.0.1:17392/bot-ws"
bot_id = "echo"
"#,
        )
        .unwrap();
        assert!(run_probe(&config).is_ok());
    }
}
