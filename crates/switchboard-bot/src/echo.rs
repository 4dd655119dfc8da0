// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference handler that streams each message back word by word.

use async_trait::async_trait;
use switchboard_core::{ChatEvent, SwitchboardError};
use tracing::{debug, warn};

use crate::dispatcher::ReplyDispatcher;
use crate::event::InboundContext;
use crate::link::BotLink;
use crate::monitor::InboundHandler;

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl EchoHandler {
    async fn echo(dispatcher: &mut ReplyDispatcher, content: &str) -> Result<(), SwitchboardError> {
        let words: Vec<&str> = content.split_inclusive(' ').collect();
        let Some((last, rest)) = words.split_last() else {
            dispatcher.send_final("").await?;
            return Ok(());
        };
        for word in rest {
            dispatcher.send_fragment(word).await?;
        }
        dispatcher.send_final(last).await?;
        Ok(())
    }
}

#[async_trait]
impl InboundHandler for EchoHandler {
    async fn on_chat(&self, event: ChatEvent, link: BotLink) {
        let ctx = InboundContext::from(&event);
        debug!(
            sender = %ctx.sender_name,
            conversation = %ctx.conversation_id,
            chat_type = %ctx.chat_type,
            "echoing message"
        );
        let mut dispatcher = ReplyDispatcher::for_event(link, &event);
        if let Err(e) = Self::echo(&mut dispatcher, &event.content).await {
            warn!(event_id = %event.id, error = %e, "echo reply failed");
        }
        dispatcher.mark_idle();
    }
}
