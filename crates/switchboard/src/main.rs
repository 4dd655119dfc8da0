// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - a relay between HTTP callers and WebSocket-connected bots.
//!
//! This is the binary entry point for the relay server and the reference bot.

mod run;
mod shutdown;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use switchboard_config::{ConfigError, SwitchboardConfig};

/// Switchboard - a relay between HTTP callers and WebSocket-connected bots.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay server.
    Serve,
    /// Connect the echo bot to a relay.
    Bot,
    /// Check that the bot section is complete enough to connect.
    Probe,
}

fn load(path: Option<&Path>) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    match path {
        Some(path) => switchboard_config::load_and_validate_path(path),
        None => switchboard_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => run::run_serve(config).await,
        Commands::Bot => run::run_bot(config).await,
        Commands::Probe => run::run_probe(&config),
    };

    if let Err(e) = result {
        eprintln!("switchboard: {e}");
        std::process::exit(1);
    }
}
