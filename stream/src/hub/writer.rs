//! Outbound frame path.
//!
//! Sessions never touch the socket directly; they write through a
//! [`FrameWriter`] so the transport can be swapped for a fault-injecting one in
//! tests.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;

use crate::error::SessionError;

/// A frame written by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Serialized notification.
    Text(String),
    /// Keepalive ping.
    Ping,
}

/// Write half of a session's connection.
#[async_trait]
pub trait FrameWriter: Send {
    /// Writes one frame.
    async fn write_frame(&mut self, frame: Frame) -> Result<(), SessionError>;

    /// Sends a close frame and shuts the connection down.
    async fn shutdown(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
impl FrameWriter for SplitSink<WebSocket, Message> {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), SessionError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Ping => Message::Ping(Bytes::new()),
        };

        SinkExt::send(self, message)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn shutdown(&mut self) -> Result<(), SessionError> {
        // The peer may already be gone; closing the sink still releases it.
        let _ = SinkExt::send(self, Message::Close(None)).await;
        SinkExt::close(self)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    /// Switches and counters shared between a test and its [`MockWriter`].
    #[derive(Debug, Default)]
    pub(crate) struct MockControl {
        pub fail_text: AtomicBool,
        pub fail_ping: AtomicBool,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub shutdowns: AtomicUsize,
    }

    /// Records frames into a channel and fails on demand.
    pub(crate) struct MockWriter {
        frames: mpsc::UnboundedSender<Frame>,
        control: Arc<MockControl>,
        delay: Duration,
    }

    impl MockWriter {
        pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Frame>, Arc<MockControl>) {
            Self::with_delay(Duration::ZERO)
        }

        pub(crate) fn with_delay(
            delay: Duration,
        ) -> (Self, mpsc::UnboundedReceiver<Frame>, Arc<MockControl>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let control = Arc::new(MockControl::default());
            let writer = Self {
                frames: tx,
                control: Arc::clone(&control),
                delay,
            };
            (writer, rx, control)
        }
    }

    #[async_trait]
    impl FrameWriter for MockWriter {
        async fn write_frame(&mut self, frame: Frame) -> Result<(), SessionError> {
            let current = self.control.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.control
                .max_in_flight
                .fetch_max(current, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let fail = match frame {
                Frame::Text(_) => self.control.fail_text.load(Ordering::SeqCst),
                Frame::Ping => self.control.fail_ping.load(Ordering::SeqCst),
            };

            let result = if fail {
                Err(SessionError::Transport("could not do something".to_string()))
            } else {
                let _ = self.frames.send(frame);
                Ok(())
            };

            self.control.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn shutdown(&mut self) -> Result<(), SessionError> {
            self.control.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Never completes a write.
    pub(crate) struct StalledWriter;

    #[async_trait]
    impl FrameWriter for StalledWriter {
        async fn write_frame(&mut self, _frame: Frame) -> Result<(), SessionError> {
            std::future::pending().await
        }

        async fn shutdown(&mut self) -> Result<(), SessionError> {
            Ok(())
        }
    }
}
