// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay-side handle to one bot connection.
//!
//! The handle never touches the socket itself. Frames are serialized and
//! pushed onto an ordered queue drained by the socket's writer task, and
//! closing the handle signals both the writer and the reader to stop.

use switchboard_core::frame::{self, RelayFrame};
use switchboard_core::{ConnectionId, SwitchboardError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Outbound frames buffered per connection before sends start failing.
pub const OUTBOUND_QUEUE: usize = 256;

/// Cloneable handle to a live bot connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Wrap the sending half of a writer queue.
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
            closed: CancellationToken::new(),
        }
    }

    /// Create a handle together with the receiving end of its writer queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue a frame for delivery.
    ///
    /// Never blocks: a full or closed queue is reported as a transport error.
    pub fn send(&self, frame: &RelayFrame) -> Result<(), SwitchboardError> {
        if self.closed.is_cancelled() {
            return Err(SwitchboardError::transport(format!(
                "connection {} is closed",
                self.id
            )));
        }
        let text = frame::encode(frame)?;
        self.tx.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => {
                SwitchboardError::transport(format!("outbound queue full on {}", self.id))
            }
            TrySendError::Closed(_) => {
                SwitchboardError::transport(format!("connection {} writer is gone", self.id))
            }
        })
    }

    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled() && !self.tx.is_closed()
    }

    /// Ask the socket tasks to shut the connection down. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called on any clone.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_serializes_in_order() {
        let (handle, mut rx) = ConnectionHandle::channel(8);
        handle.send(&RelayFrame::Ping).unwrap();
        handle
            .send(&RelayFrame::Error {
                message: "Not registered".into(),
            })
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"ping"}"#);
        assert!(rx.recv().await.unwrap().contains("Not registered"));
    }

    #[test]
    fn closed_handle_rejects_sends() {
        let (handle, _rx) = ConnectionHandle::channel(8);
        assert!(handle.is_open());
        handle.close();
        assert!(!handle.is_open());
        assert!(matches!(
            handle.send(&RelayFrame::Ping),
            Err(SwitchboardError::Transport { .. })
        ));
    }

    #[test]
    fn full_queue_is_a_transport_error() {
        let (handle, _rx) = ConnectionHandle::channel(1);
        handle.send(&RelayFrame::Ping).unwrap();
        let err = handle.send(&RelayFrame::Ping).unwrap_err();
        assert!(err.to_string().contains("queue full"));
    }

    #[test]
    fn dropped_writer_marks_handle_closed() {
        let (handle, rx) = ConnectionHandle::channel(1);
        drop(rx);
        assert!(!handle.is_open());
        assert!(handle.send(&RelayFrame::Ping).is_err());
    }

    #[tokio::test]
    async fn close_wakes_every_clone() {
        let (handle, _rx) = ConnectionHandle::channel(1);
        let watcher = handle.clone();
        let waiter = tokio::spawn(async move { watcher.closed().await });
        handle.close();
        waiter.await.unwrap();
    }
}
