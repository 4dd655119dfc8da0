// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the relay.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use switchboard_core::SwitchboardError;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;
use crate::registry::BotRegistry;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct RelayState {
    /// The bot registry every route reads from.
    pub registry: Arc<BotRegistry>,
    /// API authentication configuration.
    pub auth: AuthConfig,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl RelayState {
    pub fn new(registry: Arc<BotRegistry>, auth: AuthConfig) -> Self {
        Self {
            registry,
            auth,
            start_time: Instant::now(),
        }
    }
}

/// Build the relay router.
///
/// - GET /health (public)
/// - GET /v1/bots, POST /v1/chat (bearer auth)
/// - GET /bot-ws (bots authenticate with their registration frame)
pub fn router(state: RelayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/bots", get(handlers::get_bots))
        .route("/v1/chat", post(handlers::post_chat))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/bot-ws", get(ws::bot_ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Bind a TCP listener on `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, SwitchboardError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("failed to bind relay to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serve the relay on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: RelayState,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("relay listening on {addr}");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("relay server error: {e}"),
            source: Some(Box::new(e)),
        })
}
