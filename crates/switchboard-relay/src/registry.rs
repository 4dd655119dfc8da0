// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of authenticated bot connections.
//!
//! The registry owns the identity-to-connection map and the correlation
//! table. Every mutation of either goes through a registry method or the
//! liveness sweep; callers only ever see cloned handles and [`BotInfo`]
//! snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use switchboard_config::RelayConfig;
use switchboard_core::frame::{now_millis, ChatEvent, RelayFrame};
use switchboard_core::{BotInfo, ConnectionId, SwitchboardError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::correlation::{CorrelationTable, FragmentObserver, FragmentOutcome, PendingGuard};

/// Registry behaviour knobs, usually derived from [`RelayConfig`].
#[derive(Clone)]
pub struct RegistryConfig {
    /// Shared secret bots must present. `None` disables the check.
    pub bot_token: Option<String>,
    /// Deadline for each dispatched request.
    pub request_timeout: Duration,
    /// Fail a connection's pending requests as soon as it goes away.
    pub fail_pending_on_disconnect: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            request_timeout: Duration::from_secs(300),
            fail_pending_on_disconnect: false,
        }
    }
}

impl From<&RelayConfig> for RegistryConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            bot_token: config.effective_bot_token().map(str::to_string),
            request_timeout: config.request_timeout(),
            fail_pending_on_disconnect: config.fail_pending_on_disconnect,
        }
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[redacted]"))
            .field("request_timeout", &self.request_timeout)
            .field("fail_pending_on_disconnect", &self.fail_pending_on_disconnect)
            .finish()
    }
}

/// A request to forward to a bot.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub content: String,
    /// Sender label shown to the bot.
    pub from: String,
    /// Optional inline image as a data URL.
    pub image: Option<String>,
}

impl ChatRequest {
    pub fn new(content: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            from: from.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

struct BotEntry {
    seq: u64,
    name: String,
    connected_at: DateTime<Utc>,
    last_pong: Instant,
    handle: ConnectionHandle,
}

impl BotEntry {
    fn info(&self, id: &str) -> BotInfo {
        BotInfo {
            id: id.to_string(),
            name: self.name.clone(),
            connected_at: self.connected_at,
        }
    }
}

/// Tracks registered bots and routes requests and replies between them
/// and relay callers.
pub struct BotRegistry {
    config: RegistryConfig,
    bots: DashMap<String, BotEntry>,
    correlations: CorrelationTable,
    next_seq: AtomicU64,
}

impl BotRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            bots: DashMap::new(),
            correlations: CorrelationTable::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Bind `bot_id` to the connection behind `handle`.
    ///
    /// Last register wins: a different connection already holding `bot_id`
    /// is closed and replaced. A connection holds at most one identity, so
    /// any other identity previously bound to `handle` is released.
    pub fn register(
        &self,
        handle: &ConnectionHandle,
        bot_id: &str,
        bot_name: &str,
        token: Option<&str>,
    ) -> Result<(), SwitchboardError> {
        if let Some(expected) = &self.config.bot_token
            && token != Some(expected.as_str())
        {
            warn!(bot_id, conn_id = %handle.id(), "registration rejected: invalid token");
            return Err(SwitchboardError::AuthRejected {
                bot_id: bot_id.to_string(),
            });
        }

        let released: Vec<String> = self
            .bots
            .iter()
            .filter(|e| e.handle.id() == handle.id() && e.key() != bot_id)
            .map(|e| e.key().clone())
            .collect();
        for old_id in released {
            if self
                .bots
                .remove_if(&old_id, |_, e| e.handle.id() == handle.id())
                .is_some()
            {
                info!(bot_id = %old_id, conn_id = %handle.id(), "identity released by re-register");
            }
        }

        let name = if bot_name.trim().is_empty() {
            bot_id
        } else {
            bot_name
        };
        let entry = BotEntry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            connected_at: Utc::now(),
            last_pong: Instant::now(),
            handle: handle.clone(),
        };

        match self.bots.insert(bot_id.to_string(), entry) {
            Some(previous) if previous.handle.id() != handle.id() => {
                info!(
                    bot_id,
                    conn_id = %handle.id(),
                    replaced = %previous.handle.id(),
                    "bot re-registered, closing previous connection"
                );
                previous.handle.close();
                self.fail_pending(previous.handle.id());
            }
            _ => info!(bot_id, bot_name = name, conn_id = %handle.id(), "bot registered"),
        }
        Ok(())
    }

    /// Remove `bot_id` and close its connection. Idempotent.
    pub fn unregister(&self, bot_id: &str) -> bool {
        match self.bots.remove(bot_id) {
            Some((_, entry)) => {
                entry.handle.close();
                self.fail_pending(entry.handle.id());
                info!(bot_id, conn_id = %entry.handle.id(), "bot unregistered");
                true
            }
            None => false,
        }
    }

    /// Unregister every bot, closing their connections. Used at shutdown.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self.bots.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.unregister(id)).count()
    }

    /// Remove whichever identity is bound to `conn_id`, if any.
    ///
    /// Used when a socket closes; a newer connection that took over the
    /// identity is left alone.
    pub fn unregister_connection(&self, conn_id: &ConnectionId) -> Option<String> {
        let bot_id = self.find_identity(conn_id)?;
        self.bots
            .remove_if(&bot_id, |_, e| e.handle.id() == conn_id)
            .map(|(bot_id, _)| {
                self.fail_pending(conn_id);
                info!(%bot_id, %conn_id, "bot disconnected");
                bot_id
            })
    }

    /// Reverse lookup from a connection to the identity registered on it.
    pub fn find_identity(&self, conn_id: &ConnectionId) -> Option<String> {
        self.bots
            .iter()
            .find(|e| e.handle.id() == conn_id)
            .map(|e| e.key().clone())
    }

    /// Refresh the liveness timestamp of `bot_id`. Returns `false` if unknown.
    pub fn mark_alive(&self, bot_id: &str) -> bool {
        match self.bots.get_mut(bot_id) {
            Some(mut entry) => {
                entry.last_pong = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Forward `request` to `bot_id` and wait for the assembled reply.
    ///
    /// Fails with `NotFound` before any correlation entry is created when
    /// the bot is not registered. Dropping the returned future removes the
    /// pending entry.
    pub async fn dispatch_request(
        &self,
        bot_id: &str,
        request: ChatRequest,
        on_fragment: Option<FragmentObserver>,
    ) -> Result<String, SwitchboardError> {
        let handle = self
            .bots
            .get(bot_id)
            .map(|e| e.handle.clone())
            .ok_or_else(|| SwitchboardError::NotFound {
                bot_id: bot_id.to_string(),
            })?;

        let (correlation_id, mut completion) =
            self.correlations
                .open(bot_id, handle.id().clone(), on_fragment);
        let _guard = PendingGuard::new(&self.correlations, correlation_id.clone());

        let event = ChatEvent {
            id: correlation_id.clone(),
            content: request.content,
            from: request.from,
            timestamp: now_millis(),
            reply_to: None,
            image: request.image,
            conversation_id: None,
            chat_type: None,
            sender_name: None,
        };
        handle.send(&RelayFrame::Chat(event)).inspect_err(|e| {
            warn!(bot_id, %correlation_id, error = %e, "failed to forward request");
        })?;
        debug!(bot_id, %correlation_id, conn_id = %handle.id(), "request dispatched");

        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, &mut completion).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SwitchboardError::Internal(format!(
                "pending request {correlation_id} dropped without a result"
            ))),
            Err(_) => {
                if self.correlations.remove(&correlation_id) {
                    warn!(bot_id, %correlation_id, ?timeout, "request timed out");
                    return Err(SwitchboardError::RequestTimeout { duration: timeout });
                }
                // Lost the race to a resolver that already removed the entry.
                completion.await.unwrap_or_else(|_| {
                    Err(SwitchboardError::RequestTimeout { duration: timeout })
                })
            }
        }
    }

    /// Route a reply fragment to its pending request.
    ///
    /// Late or unknown fragments are logged and dropped.
    pub fn record_fragment(
        &self,
        bot_id: &str,
        correlation_id: &str,
        content: &str,
        terminal: bool,
    ) -> FragmentOutcome {
        let outcome = self
            .correlations
            .record(bot_id, correlation_id, content, terminal);
        match outcome {
            FragmentOutcome::Unknown => {
                warn!(bot_id, correlation_id, terminal, "late or unknown reply dropped");
            }
            FragmentOutcome::Appended => {
                debug!(bot_id, correlation_id, len = content.len(), "fragment appended");
            }
            FragmentOutcome::Completed => {
                debug!(bot_id, correlation_id, "request completed");
            }
        }
        outcome
    }

    /// Send a liveness probe to every registered bot.
    ///
    /// Individual failures are logged; returns the number of probes queued.
    pub fn ping_all(&self) -> usize {
        let targets: Vec<(String, ConnectionHandle)> = self
            .bots
            .iter()
            .map(|e| (e.key().clone(), e.handle.clone()))
            .collect();

        targets
            .into_iter()
            .filter(|(bot_id, handle)| match handle.send(&RelayFrame::Ping) {
                Ok(()) => true,
                Err(e) => {
                    warn!(%bot_id, conn_id = %handle.id(), error = %e, "ping failed");
                    false
                }
            })
            .count()
    }

    /// Close and remove every bot silent for longer than `threshold`.
    pub fn evict_stale(&self, threshold: Duration) -> Vec<String> {
        let now = Instant::now();
        let is_stale = |e: &BotEntry| now.duration_since(e.last_pong) > threshold;

        let candidates: Vec<String> = self
            .bots
            .iter()
            .filter(|e| is_stale(e.value()))
            .map(|e| e.key().clone())
            .collect();

        let mut evicted = Vec::new();
        for bot_id in candidates {
            if let Some((bot_id, entry)) = self.bots.remove_if(&bot_id, |_, e| is_stale(e)) {
                warn!(
                    %bot_id,
                    conn_id = %entry.handle.id(),
                    silent_for = ?now.duration_since(entry.last_pong),
                    "evicting stale bot"
                );
                entry.handle.close();
                self.fail_pending(entry.handle.id());
                evicted.push(bot_id);
            }
        }
        evicted
    }

    /// Snapshot of every registered bot, sorted by id.
    pub fn list_bots(&self) -> Vec<BotInfo> {
        let mut bots: Vec<BotInfo> = self.bots.iter().map(|e| e.info(e.key())).collect();
        bots.sort_by(|a, b| a.id.cmp(&b.id));
        bots
    }

    pub fn get_bot(&self, bot_id: &str) -> Option<BotInfo> {
        self.bots.get(bot_id).map(|e| e.info(e.key()))
    }

    /// The longest-connected bot, used when a caller names no target.
    pub fn first_available(&self) -> Option<String> {
        self.bots
            .iter()
            .min_by_key(|e| e.seq)
            .map(|e| e.key().clone())
    }

    pub fn is_registered(&self, bot_id: &str) -> bool {
        self.bots.contains_key(bot_id)
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    /// Number of requests still waiting for a terminal fragment.
    pub fn pending_count(&self) -> usize {
        self.correlations.len()
    }

    fn fail_pending(&self, conn_id: &ConnectionId) {
        if !self.config.fail_pending_on_disconnect {
            return;
        }
        let failed = self.correlations.fail_connection(conn_id, |bot_id| {
            SwitchboardError::ConnectionClosed {
                bot_id: bot_id.to_string(),
            }
        });
        if failed > 0 {
            info!(%conn_id, failed, "failed pending requests of closed connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use switchboard_core::frame;
    use tokio::sync::mpsc;

    use super::*;

    fn registry(config: RegistryConfig) -> Arc<BotRegistry> {
        Arc::new(BotRegistry::new(config))
    }

    fn connect() -> (ConnectionHandle, mpsc::Receiver<String>) {
        ConnectionHandle::channel(16)
    }

    async fn next_chat(rx: &mut mpsc::Receiver<String>) -> ChatEvent {
        loop {
            let raw = rx.recv().await.expect("connection queue closed");
            if let RelayFrame::Chat(event) = frame::decode(&raw).unwrap() {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn streamed_reply_resolves_dispatch() {
        let registry = registry(RegistryConfig::default());
        let (handle, mut rx) = connect();
        registry.register(&handle, "b1", "Bot One", None).unwrap();

        let r = registry.clone();
        let call = tokio::spawn(async move {
            r.dispatch_request("b1", ChatRequest::new("hello", "api"), None)
                .await
        });

        let chat = next_chat(&mut rx).await;
        assert_eq!(chat.content, "hello");
        assert_eq!(chat.from, "api");
        registry.record_fragment("b1", &chat.id, "hi ", false);
        registry.record_fragment("b1", &chat.id, "there", true);

        assert_eq!(call.await.unwrap().unwrap(), "hi there");
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn wrong_token_is_rejected() {
        let registry = registry(RegistryConfig {
            bot_token: Some("secret".into()),
            ..RegistryConfig::default()
        });
        let (handle, _rx) = connect();

        let err = registry
            .register(&handle, "b1", "Bot", Some("wrong"))
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::AuthRejected { bot_id } if bot_id == "b1"));
        assert!(registry.find_identity(handle.id()).is_none());
        assert!(handle.is_open());

        let err = registry.register(&handle, "b1", "Bot", None).unwrap_err();
        assert!(matches!(err, SwitchboardError::AuthRejected { .. }));

        registry
            .register(&handle, "b1", "Bot", Some("secret"))
            .unwrap();
        assert_eq!(registry.find_identity(handle.id()).as_deref(), Some("b1"));
    }

    #[tokio::test]
    async fn unknown_bot_fails_without_pending_entry() {
        let registry = registry(RegistryConfig::default());
        let err = registry
            .dispatch_request("ghost", ChatRequest::new("hi", "api"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::NotFound { bot_id } if bot_id == "ghost"));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_late_fragment_is_dropped() {
        let registry = registry(RegistryConfig {
            request_timeout: Duration::from_secs(300),
            ..RegistryConfig::default()
        });
        let (handle, mut rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        let r = registry.clone();
        let call = tokio::spawn(async move {
            r.dispatch_request("b1", ChatRequest::new("slow", "api"), None)
                .await
        });
        let chat = next_chat(&mut rx).await;
        assert_eq!(
            registry.record_fragment("b1", &chat.id, "partial", false),
            FragmentOutcome::Appended
        );

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::RequestTimeout { duration } if duration == Duration::from_secs(300)
        ));
        assert_eq!(registry.pending_count(), 0);
        assert_eq!(
            registry.record_fragment("b1", &chat.id, "late", true),
            FragmentOutcome::Unknown
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn fragment_for_unknown_request_is_logged() {
        let registry = registry(RegistryConfig::default());
        let (handle, _rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        assert_eq!(
            registry.record_fragment("b1", "no-such-request", "x", true),
            FragmentOutcome::Unknown
        );
        assert!(logs_contain("late or unknown reply dropped"));
    }

    #[tokio::test]
    async fn re_register_replaces_previous_connection() {
        let registry = registry(RegistryConfig::default());
        let (first, mut first_rx) = connect();
        let (second, mut second_rx) = connect();
        registry.register(&first, "b1", "Bot", None).unwrap();
        registry.register(&second, "b1", "Bot", None).unwrap();

        assert!(!first.is_open());
        assert!(registry.find_identity(first.id()).is_none());
        assert_eq!(registry.find_identity(second.id()).as_deref(), Some("b1"));

        let r = registry.clone();
        let call = tokio::spawn(async move {
            r.dispatch_request("b1", ChatRequest::new("who?", "api"), None)
                .await
        });
        let chat = next_chat(&mut second_rx).await;
        registry.record_fragment("b1", &chat.id, "second", true);
        assert_eq!(call.await.unwrap().unwrap(), "second");
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn old_socket_close_does_not_drop_new_registration() {
        let registry = registry(RegistryConfig::default());
        let (first, _rx1) = connect();
        let (second, _rx2) = connect();
        registry.register(&first, "b1", "Bot", None).unwrap();
        registry.register(&second, "b1", "Bot", None).unwrap();

        assert!(registry.unregister_connection(first.id()).is_none());
        assert!(registry.is_registered("b1"));
        assert_eq!(
            registry.unregister_connection(second.id()).as_deref(),
            Some("b1")
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn connection_holds_a_single_identity() {
        let registry = registry(RegistryConfig::default());
        let (handle, _rx) = connect();
        registry.register(&handle, "old", "Old", None).unwrap();
        registry.register(&handle, "new", "New", None).unwrap();

        assert!(!registry.is_registered("old"));
        assert_eq!(registry.find_identity(handle.id()).as_deref(), Some("new"));
        assert!(handle.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn reply_after_identity_switch_still_resolves() {
        let registry = registry(RegistryConfig {
            request_timeout: Duration::from_secs(5),
            ..RegistryConfig::default()
        });
        let (handle, mut rx) = connect();
        registry.register(&handle, "old", "Old", None).unwrap();

        let r = registry.clone();
        let call = tokio::spawn(async move {
            r.dispatch_request("old", ChatRequest::new("hi", "api"), None)
                .await
        });
        let chat = next_chat(&mut rx).await;

        registry.register(&handle, "new", "New", None).unwrap();
        let bot_id = registry.find_identity(handle.id()).unwrap();
        assert_eq!(
            registry.record_fragment(&bot_id, &chat.id, "still here", true),
            FragmentOutcome::Completed
        );
        assert_eq!(call.await.unwrap().unwrap(), "still here");
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = registry(RegistryConfig::default());
        let (handle, _rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        assert!(registry.unregister("b1"));
        assert!(!registry.unregister("b1"));
        assert!(!handle.is_open());
    }

    #[test]
    fn close_all_closes_every_connection() {
        let registry = registry(RegistryConfig::default());
        let (a, _ra) = connect();
        let (b, _rb) = connect();
        registry.register(&a, "a", "A", None).unwrap();
        registry.register(&b, "b", "B", None).unwrap();

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert!(!a.is_open() && !b.is_open());
    }

    #[tokio::test]
    async fn disconnect_fails_pending_when_enabled() {
        let registry = registry(RegistryConfig {
            fail_pending_on_disconnect: true,
            ..RegistryConfig::default()
        });
        let (handle, mut rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        let r = registry.clone();
        let call = tokio::spawn(async move {
            r.dispatch_request("b1", ChatRequest::new("hi", "api"), None)
                .await
        });
        next_chat(&mut rx).await;
        registry.unregister_connection(handle.id());

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, SwitchboardError::ConnectionClosed { bot_id } if bot_id == "b1"));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_keeps_pending_by_default() {
        let registry = registry(RegistryConfig::default());
        let (handle, mut rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        let r = registry.clone();
        let call = tokio::spawn(async move {
            r.dispatch_request("b1", ChatRequest::new("hi", "api"), None)
                .await
        });
        next_chat(&mut rx).await;
        registry.unregister("b1");
        assert_eq!(registry.pending_count(), 1);

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, SwitchboardError::RequestTimeout { .. }));
    }

    #[tokio::test]
    async fn dropped_dispatch_removes_pending_entry() {
        let registry = registry(RegistryConfig::default());
        let (handle, mut rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        let r = registry.clone();
        let call = tokio::spawn(async move {
            r.dispatch_request("b1", ChatRequest::new("hi", "api"), None)
                .await
        });
        let chat = next_chat(&mut rx).await;
        assert_eq!(registry.pending_count(), 1);

        call.abort();
        let _ = call.await;
        assert_eq!(registry.pending_count(), 0);
        assert_eq!(
            registry.record_fragment("b1", &chat.id, "x", true),
            FragmentOutcome::Unknown
        );
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_connection() {
        let registry = registry(RegistryConfig::default());
        let (handle, mut rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        let r1 = registry.clone();
        let first = tokio::spawn(async move {
            r1.dispatch_request("b1", ChatRequest::new("one", "api"), None)
                .await
        });
        let chat_one = next_chat(&mut rx).await;
        let r2 = registry.clone();
        let second = tokio::spawn(async move {
            r2.dispatch_request("b1", ChatRequest::new("two", "api"), None)
                .await
        });
        let chat_two = next_chat(&mut rx).await;
        assert_ne!(chat_one.id, chat_two.id);

        registry.record_fragment("b1", &chat_two.id, "2", true);
        registry.record_fragment("b1", &chat_one.id, "1", true);
        assert_eq!(first.await.unwrap().unwrap(), "1");
        assert_eq!(second.await.unwrap().unwrap(), "2");
    }

    #[tokio::test]
    async fn observer_receives_partial_fragments() {
        let registry = registry(RegistryConfig::default());
        let (handle, mut rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: FragmentObserver =
            Arc::new(move |content, _done| sink.lock().unwrap().push(content.to_string()));

        let r = registry.clone();
        let call = tokio::spawn(async move {
            r.dispatch_request("b1", ChatRequest::new("hi", "api"), Some(observer))
                .await
        });
        let chat = next_chat(&mut rx).await;
        registry.record_fragment("b1", &chat.id, "a", false);
        registry.record_fragment("b1", &chat.id, "b", true);
        call.await.unwrap().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn image_is_forwarded_on_chat_frame() {
        let registry = registry(RegistryConfig::default());
        let (handle, mut rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();

        let r = registry.clone();
        let _call = tokio::spawn(async move {
            r.dispatch_request(
                "b1",
                ChatRequest::new("look", "api").with_image("data:image/png;base64,AA=="),
                None,
            )
            .await
        });
        let chat = next_chat(&mut rx).await;
        assert_eq!(chat.image.as_deref(), Some("data:image/png;base64,AA=="));
    }

    #[tokio::test]
    async fn send_failure_surfaces_transport_error() {
        let registry = registry(RegistryConfig::default());
        let (handle, rx) = connect();
        registry.register(&handle, "b1", "Bot", None).unwrap();
        drop(rx);

        let err = registry
            .dispatch_request("b1", ChatRequest::new("hi", "api"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::Transport { .. }));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn evict_stale_removes_only_silent_bots() {
        let registry = registry(RegistryConfig::default());
        let (quiet, _rx1) = connect();
        let (chatty, _rx2) = connect();
        registry.register(&quiet, "quiet", "Quiet", None).unwrap();
        registry.register(&chatty, "chatty", "Chatty", None).unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        registry.mark_alive("chatty");
        tokio::time::advance(Duration::from_secs(40)).await;

        let evicted = registry.evict_stale(Duration::from_secs(90));
        assert_eq!(evicted, vec!["quiet".to_string()]);
        assert!(!quiet.is_open());
        assert!(chatty.is_open());
        assert!(registry.is_registered("chatty"));
    }

    #[test]
    fn ping_all_tolerates_failures() {
        let registry = registry(RegistryConfig::default());
        let (alive, mut alive_rx) = connect();
        let (dead, dead_rx) = connect();
        registry.register(&alive, "alive", "A", None).unwrap();
        registry.register(&dead, "dead", "D", None).unwrap();
        drop(dead_rx);

        assert_eq!(registry.ping_all(), 1);
        assert_eq!(alive_rx.try_recv().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn listing_and_first_available() {
        let registry = registry(RegistryConfig::default());
        let (a, _ra) = connect();
        let (b, _rb) = connect();
        registry.register(&b, "zeta", "", None).unwrap();
        registry.register(&a, "alpha", "Alpha", None).unwrap();

        let ids: Vec<String> = registry.list_bots().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert_eq!(registry.get_bot("zeta").unwrap().name, "zeta");
        assert_eq!(registry.first_available().as_deref(), Some("zeta"));
        assert!(registry.get_bot("ghost").is_none());
    }

    #[test]
    fn config_from_relay_config() {
        let relay = RelayConfig {
            bot_token: Some(String::new()),
            request_timeout_secs: 12,
            fail_pending_on_disconnect: true,
            ..RelayConfig::default()
        };
        let config = RegistryConfig::from(&relay);
        assert!(config.bot_token.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert!(config.fail_pending_on_disconnect);

        let debug = format!(
            "{:?}",
            RegistryConfig {
                bot_token: Some("secret".into()),
                ..config
            }
        );
        assert!(!debug.contains("secret"));
    }
}
