// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay side of the Switchboard bot protocol.
//!
//! Bots connect to `/bot-ws`, register an identity, and answer `chat`
//! frames with streamed `reply` fragments. The [`BotRegistry`] owns the
//! connection map and the correlation table; the liveness loop prunes bots
//! that stop answering pings; the HTTP API lets callers reach a bot.

pub mod auth;
pub mod connection;
pub mod correlation;
pub mod handlers;
pub mod liveness;
pub mod registry;
pub mod server;
pub mod sse;
pub mod ws;

use std::sync::Arc;

use switchboard_config::RelayConfig;
use switchboard_core::SwitchboardError;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use auth::AuthConfig;
pub use connection::ConnectionHandle;
pub use correlation::{CorrelationTable, FragmentObserver, FragmentOutcome};
pub use liveness::{run_liveness, LivenessConfig};
pub use registry::{BotRegistry, ChatRequest, RegistryConfig};
pub use server::RelayState;

/// A configured relay: registry, liveness loop, and HTTP/WebSocket server.
pub struct Relay {
    config: RelayConfig,
    registry: Arc<BotRegistry>,
    auth: AuthConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(BotRegistry::new(RegistryConfig::from(&config)));
        let auth = AuthConfig::new(config.api_token.clone());
        Self {
            config,
            registry,
            auth,
        }
    }

    /// The registry, for callers embedding the relay in-process.
    pub fn registry(&self) -> Arc<BotRegistry> {
        self.registry.clone()
    }

    /// Bind the configured `host:port`.
    pub async fn bind(&self) -> Result<TcpListener, SwitchboardError> {
        server::bind(&self.config.host, self.config.port).await
    }

    /// Serve on `listener` until `cancel` fires, then close every bot connection.
    pub async fn serve(
        &self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), SwitchboardError> {
        let liveness_cancel = cancel.child_token();
        let liveness = tokio::spawn(run_liveness(
            self.registry.clone(),
            LivenessConfig::from(&self.config),
            liveness_cancel.clone(),
        ));

        let state = RelayState::new(self.registry.clone(), self.auth.clone());
        let result = server::serve(listener, state, cancel).await;

        liveness_cancel.cancel();
        let _ = liveness.await;
        let closed = self.registry.close_all();
        info!(closed, "relay stopped");
        result
    }

    /// Bind and serve until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SwitchboardError> {
        let listener = self.bind().await?;
        self.serve(listener, cancel).await
    }
}
