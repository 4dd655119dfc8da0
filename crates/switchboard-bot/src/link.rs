// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-connection send context handed to everything that talks to the relay.
//!
//! A new [`BotLink`] is created for every connection the monitor opens and
//! closed when that connection ends, so a reply started on a dead connection
//! fails instead of leaking onto its replacement.

use switchboard_core::frame::{self, BotFrame};
use switchboard_core::SwitchboardError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Outbound frames buffered per connection.
pub const OUTBOUND_QUEUE: usize = 256;

/// Cloneable sender bound to one relay connection.
#[derive(Debug, Clone)]
pub struct BotLink {
    tx: mpsc::Sender<String>,
    closed: CancellationToken,
}

impl BotLink {
    /// Create a link together with the receiving end its writer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let link = Self {
            tx,
            closed: CancellationToken::new(),
        };
        (link, rx)
    }

    /// Queue a frame for the relay.
    ///
    /// Frames from one caller are written in call order. Waits while the
    /// queue is full; fails once the connection is closed.
    pub async fn send(&self, frame: &BotFrame) -> Result<(), SwitchboardError> {
        if !self.is_open() {
            return Err(SwitchboardError::transport("relay connection is not open"));
        }
        let text = frame::encode(frame)?;
        tokio::select! {
            result = self.tx.send(text) => result.map_err(|_| {
                SwitchboardError::transport("relay connection writer is gone")
            }),
            () = self.closed.cancelled() => {
                Err(SwitchboardError::transport("relay connection closed while sending"))
            }
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled() && !self.tx.is_closed()
    }

    /// Mark the connection closed. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_arrive_in_send_order() {
        let (link, mut rx) = BotLink::channel(4);
        link.send(&BotFrame::Pong).await.unwrap();
        link.send(&BotFrame::Register {
            bot_id: "b1".into(),
            bot_name: "Bot".into(),
            token: String::new(),
        })
        .await
        .unwrap();

        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"pong"}"#);
        assert!(rx.recv().await.unwrap().contains(r#""botId":"b1""#));
    }

    #[tokio::test]
    async fn closed_link_rejects_sends() {
        let (link, _rx) = BotLink::channel(4);
        link.close();
        let err = link.send(&BotFrame::Pong).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Transport { .. }));
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn close_unblocks_a_full_queue() {
        let (link, _rx) = BotLink::channel(1);
        link.send(&BotFrame::Pong).await.unwrap();

        let blocked = link.clone();
        let pending = tokio::spawn(async move { blocked.send(&BotFrame::Pong).await });
        tokio::task::yield_now().await;
        link.close();

        assert!(pending.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn dropped_writer_closes_link() {
        let (link, rx) = BotLink::channel(1);
        drop(rx);
        assert!(!link.is_open());
        assert!(link.send(&BotFrame::Pong).await.is_err());
    }
}
