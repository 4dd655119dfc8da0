// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound chat events: normalized context and admission filtering.

use std::collections::{HashSet, VecDeque};

use switchboard_config::{BotConfig, DmPolicy};
use switchboard_core::{ChatEvent, ChatType};

/// How many recent event ids are remembered for duplicate suppression.
pub const RECENT_EVENT_IDS: usize = 256;

/// A chat event with its optional metadata resolved to concrete values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundContext {
    /// Correlation id to echo back as `replyTo`.
    pub message_id: String,
    /// Defaults to the sender id.
    pub conversation_id: String,
    pub sender_id: String,
    /// Defaults to the sender id.
    pub sender_name: String,
    pub chat_type: ChatType,
    pub content: String,
    pub reply_to: Option<String>,
    pub image: Option<String>,
    pub timestamp: i64,
}

impl InboundContext {
    pub fn from_event(event: &ChatEvent) -> Self {
        Self {
            message_id: event.id.clone(),
            conversation_id: event
                .conversation_id
                .clone()
                .unwrap_or_else(|| event.from.clone()),
            sender_id: event.from.clone(),
            sender_name: event
                .sender_name
                .clone()
                .unwrap_or_else(|| event.from.clone()),
            chat_type: event.chat_type.unwrap_or_default(),
            content: event.content.clone(),
            reply_to: event.reply_to.clone(),
            image: event.image.clone(),
            timestamp: event.timestamp,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.chat_type == ChatType::Direct
    }
}

impl From<&ChatEvent> for InboundContext {
    fn from(event: &ChatEvent) -> Self {
        Self::from_event(event)
    }
}

/// Verdict for one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// The same event id was seen recently.
    Duplicate,
    /// A direct message from a sender outside the allowlist.
    NotAllowed,
}

/// Bounded set of the most recently seen ids.
#[derive(Debug)]
pub struct RecentIds {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `id`; returns `false` if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Decides which chat events reach the inbound handler.
#[derive(Debug)]
pub struct InboundFilter {
    policy: DmPolicy,
    allow_from: HashSet<String>,
    recent: RecentIds,
}

impl InboundFilter {
    pub fn new(policy: DmPolicy, allow_from: impl IntoIterator<Item = String>) -> Self {
        Self {
            policy,
            allow_from: allow_from.into_iter().collect(),
            recent: RecentIds::new(RECENT_EVENT_IDS),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.dm_policy, config.allow_from.iter().cloned())
    }

    /// Check `event`, remembering its id when it is admitted.
    ///
    /// Group conversations bypass the allowlist.
    pub fn admit(&mut self, event: &ChatEvent) -> Admission {
        let direct = event.chat_type.unwrap_or_default() == ChatType::Direct;
        if direct && self.policy == DmPolicy::Allowlist && !self.allow_from.contains(&event.from) {
            return Admission::NotAllowed;
        }
        if !self.recent.insert(&event.id) {
            return Admission::Duplicate;
        }
        Admission::Accept
    }
}

impl Default for InboundFilter {
    fn default() -> Self {
        Self::new(DmPolicy::Open, Vec::new())
    }
}
