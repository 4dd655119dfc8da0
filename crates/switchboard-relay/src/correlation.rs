// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation table mapping request identifiers to pending replies.
//!
//! Each entry owns a single-assignment completion channel. Whichever path
//! removes the entry first (terminal fragment, explicit failure, timeout, or
//! cancellation) is the only one that can resolve it, so a timeout racing a
//! late terminal fragment resolves exactly once.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use switchboard_core::{ConnectionId, SwitchboardError};
use tokio::sync::oneshot;
use tracing::warn;

/// Callback invoked with each fragment's content and its terminal flag.
pub type FragmentObserver = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Receiving side of a pending request's completion channel.
pub type Completion = oneshot::Receiver<Result<String, SwitchboardError>>;

/// What happened to a recorded fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// Appended to a still-pending request.
    Appended,
    /// Terminal fragment; the request resolved and its entry is gone.
    Completed,
    /// No pending request matched (late or unknown).
    Unknown,
}

struct PendingRequest {
    bot_id: String,
    connection: ConnectionId,
    chunks: Vec<String>,
    observer: Option<FragmentObserver>,
    completion: oneshot::Sender<Result<String, SwitchboardError>>,
}

/// Concurrent map from correlation id to pending request state.
#[derive(Default)]
pub struct CorrelationTable {
    pending: DashMap<String, PendingRequest>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending request for `bot_id` on `connection`.
    ///
    /// Returns a correlation id that is not held by any live entry, plus the
    /// receiver that yields the assembled reply.
    pub fn open(
        &self,
        bot_id: &str,
        connection: ConnectionId,
        observer: Option<FragmentObserver>,
    ) -> (String, Completion) {
        let (tx, rx) = oneshot::channel();
        let mut request = Some(PendingRequest {
            bot_id: bot_id.to_string(),
            connection,
            chunks: Vec::new(),
            observer,
            completion: tx,
        });

        loop {
            let id = uuid::Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = self.pending.entry(id.clone())
                && let Some(request) = request.take()
            {
                slot.insert(request);
                return (id, rx);
            }
        }
    }

    /// Record one reply fragment from `bot_id`.
    ///
    /// The entry is found by `correlation_id` alone; a sender other than the
    /// bot the request went to is logged but still accepted.
    ///
    /// Non-terminal fragments are appended; a terminal fragment removes the
    /// entry and resolves it with the concatenation of every fragment in
    /// arrival order. The observer runs outside the map lock.
    pub fn record(
        &self,
        bot_id: &str,
        correlation_id: &str,
        content: &str,
        terminal: bool,
    ) -> FragmentOutcome {
        if terminal {
            let Some((_, mut request)) = self.pending.remove(correlation_id) else {
                return FragmentOutcome::Unknown;
            };
            warn_on_sender_mismatch(&request.bot_id, bot_id, correlation_id);
            request.chunks.push(content.to_string());
            if let Some(observer) = &request.observer {
                observer(content, true);
            }
            let _ = request.completion.send(Ok(request.chunks.concat()));
            return FragmentOutcome::Completed;
        }

        let observer = match self.pending.get_mut(correlation_id) {
            Some(mut request) => {
                warn_on_sender_mismatch(&request.bot_id, bot_id, correlation_id);
                request.chunks.push(content.to_string());
                request.observer.clone()
            }
            None => return FragmentOutcome::Unknown,
        };
        if let Some(observer) = observer {
            observer(content, false);
        }
        FragmentOutcome::Appended
    }

    /// Remove a pending request and resolve it with `error`.
    ///
    /// Returns `false` if the entry was already gone.
    pub fn fail(&self, correlation_id: &str, error: SwitchboardError) -> bool {
        match self.pending.remove(correlation_id) {
            Some((_, request)) => {
                let _ = request.completion.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Remove a pending request without resolving it.
    pub fn remove(&self, correlation_id: &str) -> bool {
        self.pending.remove(correlation_id).is_some()
    }

    /// Fail every request bound to `connection`, returning how many failed.
    pub fn fail_connection(
        &self,
        connection: &ConnectionId,
        error: impl Fn(&str) -> SwitchboardError,
    ) -> usize {
        let ids: Vec<(String, String)> = self
            .pending
            .iter()
            .filter(|entry| &entry.connection == connection)
            .map(|entry| (entry.key().clone(), entry.bot_id.clone()))
            .collect();

        ids.into_iter()
            .filter(|(id, bot_id)| self.fail(id, error(bot_id)))
            .count()
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.pending.contains_key(correlation_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn warn_on_sender_mismatch(expected: &str, bot_id: &str, correlation_id: &str) {
    if expected != bot_id {
        warn!(
            bot_id,
            expected,
            correlation_id,
            "reply fragment from a different identity than the request went to"
        );
    }
}

/// Removes a pending request when dropped.
///
/// Held by the dispatching future so a cancelled caller leaves no entry behind.
pub(crate) struct PendingGuard<'a> {
    table: &'a CorrelationTable,
    correlation_id: String,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a CorrelationTable, correlation_id: String) -> Self {
        Self {
            table,
            correlation_id,
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(&self.correlation_id);
    }
}
