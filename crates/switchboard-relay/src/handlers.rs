// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the relay REST API.
//!
//! Handles GET /health, GET /v1/bots, and POST /v1/chat.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use switchboard_core::frame::now_millis;
use switchboard_core::{BotInfo, SwitchboardError};

use crate::registry::{BotRegistry, ChatRequest};
use crate::server::RelayState;
use crate::sse;

/// Sender label attached to requests that arrive through the HTTP API.
pub const API_SENDER: &str = "api";

/// Request body for POST /v1/chat.
#[derive(Debug, Deserialize)]
pub struct ChatApiRequest {
    /// Message text. May start with `@<botId> ` to pick a bot.
    pub message: String,
    /// Explicit target bot id; wins over a mention.
    #[serde(default)]
    pub target: Option<String>,
    /// Optional inline image as a data URL.
    #[serde(default)]
    pub image: Option<String>,
}

/// Response body for POST /v1/chat.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiResponse {
    pub bot_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    /// Number of registered bots.
    pub bots: usize,
    pub bot_ids: Vec<String>,
    pub uptime_secs: u64,
}

/// Response body for GET /v1/bots.
#[derive(Debug, Serialize)]
pub struct BotListResponse {
    pub bots: Vec<BotInfo>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Map a dispatch failure onto an HTTP status.
pub fn status_for(err: &SwitchboardError) -> StatusCode {
    match err {
        SwitchboardError::NotFound { .. } => StatusCode::NOT_FOUND,
        SwitchboardError::RequestTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Pick the bot a message is for and the text to send it.
///
/// Order: explicit `target`, then a leading `@<botId>` mention (stripped
/// from the text), then the longest-connected bot.
pub fn resolve_target(
    registry: &BotRegistry,
    message: &str,
    target: Option<&str>,
) -> Option<(String, String)> {
    if let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) {
        return Some((target.to_string(), message.to_string()));
    }
    if let Some((bot_id, text)) = split_mention(message) {
        return Some((bot_id.to_string(), text.to_string()));
    }
    registry
        .first_available()
        .map(|bot_id| (bot_id, message.to_string()))
}

fn split_mention(message: &str) -> Option<(&str, &str)> {
    let rest = message.strip_prefix('@')?;
    let end = rest.find(char::is_whitespace)?;
    if end == 0 {
        return None;
    }
    Some((&rest[..end], rest[end..].trim_start()))
}

/// GET /health
///
/// Public liveness endpoint listing registered bot ids.
pub async fn get_public_health(State(state): State<RelayState>) -> Json<HealthResponse> {
    let bot_ids: Vec<String> = state
        .registry
        .list_bots()
        .into_iter()
        .map(|b| b.id)
        .collect();
    Json(HealthResponse {
        status: "ok".to_string(),
        bots: bot_ids.len(),
        bot_ids,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /v1/bots
pub async fn get_bots(State(state): State<RelayState>) -> Json<BotListResponse> {
    Json(BotListResponse {
        bots: state.registry.list_bots(),
    })
}

/// POST /v1/chat
///
/// Routes a message to a bot and returns its assembled reply. If the Accept
/// header contains "text/event-stream", the reply is streamed as SSE instead.
pub async fn post_chat(
    State(state): State<RelayState>,
    headers: HeaderMap,
    Json(body): Json<ChatApiRequest>,
) -> Response {
    if body.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }

    let Some((bot_id, text)) =
        resolve_target(&state.registry, &body.message, body.target.as_deref())
    else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "no bot available");
    };

    let mut request = ChatRequest::new(text, API_SENDER);
    request.image = body.image;

    let accept = headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if accept.contains("text/event-stream") {
        return sse::stream_chat(state, bot_id, request).into_response();
    }

    match state
        .registry
        .dispatch_request(&bot_id, request, None)
        .await
    {
        Ok(content) => Json(ChatApiResponse {
            bot_id,
            content,
            timestamp: now_millis(),
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(%bot_id, error = %e, "chat request failed");
            error_response(status_for(&e), e.to_string())
        }
    }
}
