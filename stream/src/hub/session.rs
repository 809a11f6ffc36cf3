//! Per-connection session.
//!
//! A session owns the write half of one accepted connection. Two tasks run for
//! it: the liveness loop pings on every `ping_period`, and the read loop waits
//! for inbound frames purely to notice the peer dying. Either of them, or a
//! failed delivery, or hub shutdown can end the session; teardown runs once.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::metrics::HubMetrics;
use super::registry::Registry;
use super::writer::{Frame, FrameWriter};
use crate::config::HubConfig;
use crate::error::SessionError;
use crate::messages::UserId;

/// Unique session identifier.
pub type SessionId = u64;

/// Global session ID counter.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique session ID.
#[must_use]
pub fn next_session_id() -> SessionId {
    SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered and accepting writes.
    Open,
    /// Teardown in progress.
    Closing,
    /// Teardown complete.
    Closed,
}

impl SessionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closing => 1,
            Self::Closed => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame or ended the stream.
    RemoteClosed,
    /// Reading from the connection failed.
    ReadError,
    /// No pong arrived within the read window.
    LivenessTimeout,
    /// Writing a ping failed.
    PingFailed,
    /// Writing a notification failed.
    WriteFailed,
    /// The hub is shutting down.
    HubShutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::RemoteClosed => "remote closed",
            Self::ReadError => "read error",
            Self::LivenessTimeout => "liveness timeout",
            Self::PingFailed => "ping failed",
            Self::WriteFailed => "write failed",
            Self::HubShutdown => "hub shutdown",
        };
        f.write_str(reason)
    }
}

/// One accepted connection bound to one user.
pub struct Session {
    id: SessionId,
    user_id: UserId,
    config: HubConfig,
    writer: Mutex<Box<dyn FrameWriter>>,
    state: AtomicU8,
    /// Cancelled when teardown begins; stops both loops.
    shutdown: CancellationToken,
    /// Cancelled when teardown has finished.
    terminated: CancellationToken,
    registry: Weak<Registry>,
    metrics: Arc<HubMetrics>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        user_id: UserId,
        writer: Box<dyn FrameWriter>,
        config: HubConfig,
        registry: Weak<Registry>,
        metrics: Arc<HubMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: next_session_id(),
            user_id,
            config,
            writer: Mutex::new(writer),
            state: AtomicU8::new(SessionState::Open.as_u8()),
            shutdown: CancellationToken::new(),
            terminated: CancellationToken::new(),
            registry,
            metrics,
        })
    }

    /// Returns the session ID.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true while the session accepts writes.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Serializes `message` and writes it to the connection.
    ///
    /// A failed or timed-out write tears the session down.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed, the message cannot be
    /// serialized, or the write fails.
    pub async fn deliver<M>(&self, message: &M) -> Result<(), SessionError>
    where
        M: Serialize + Sync + ?Sized,
    {
        let payload = serde_json::to_string(message)?;
        self.deliver_text(&payload).await
    }

    /// Writes an already serialized notification to the connection.
    ///
    /// A failed or timed-out write tears the session down.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or the write fails.
    pub async fn deliver_text(&self, payload: &str) -> Result<(), SessionError> {
        match self.write(Frame::Text(payload.to_owned())).await {
            Ok(()) => {
                self.metrics.record_delivered();
                Ok(())
            }
            Err(e) => {
                self.metrics.record_delivery_failure();
                if e.is_fatal() {
                    self.teardown(CloseReason::WriteFailed).await;
                }
                Err(e)
            }
        }
    }

    /// Writes a keepalive ping.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or the write fails; a failed
    /// write tears the session down.
    pub async fn ping(&self) -> Result<(), SessionError> {
        match self.write(Frame::Ping).await {
            Ok(()) => {
                self.metrics.record_ping_sent();
                Ok(())
            }
            Err(e) => {
                if e.is_fatal() {
                    self.metrics.record_ping_failure();
                    self.teardown(CloseReason::PingFailed).await;
                }
                Err(e)
            }
        }
    }

    /// Tears the session down and waits until teardown has finished.
    pub async fn close(&self) {
        self.teardown(CloseReason::HubShutdown).await;
    }

    /// Waits until the session has been torn down.
    pub async fn closed(&self) {
        self.terminated.cancelled().await;
    }

    /// Spawns the liveness and read loops.
    pub(crate) fn start<S, E>(self: &Arc<Self>, frames: S)
    where
        S: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
        E: fmt::Display + Send + 'static,
    {
        tokio::spawn(Arc::clone(self).run_liveness());
        tokio::spawn(Arc::clone(self).run_reader(frames));
    }

    async fn write(&self, frame: Frame) -> Result<(), SessionError> {
        let mut writer = self.writer.lock().await;
        if !self.is_open() {
            return Err(SessionError::Closed);
        }

        match time::timeout(self.config.write_wait, writer.write_frame(frame)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::WriteTimeout(self.config.write_wait)),
        }
    }

    async fn run_liveness(self: Arc<Self>) {
        let period = self.config.ping_period;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.ping().await {
                        debug!(session_id = self.id, error = %e, "ping failed");
                        break;
                    }
                }
            }
        }
    }

    async fn run_reader<S, E>(self: Arc<Self>, mut frames: S)
    where
        S: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
        E: fmt::Display + Send + 'static,
    {
        let window = self.config.read_window();
        let mut deadline = Instant::now() + window;

        let reason = loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return,
                next = time::timeout_at(deadline, frames.next()) => match next {
                    Err(_) => {
                        self.metrics.record_liveness_timeout();
                        break CloseReason::LivenessTimeout;
                    }
                    Ok(None) | Ok(Some(Ok(Message::Close(_)))) => break CloseReason::RemoteClosed,
                    Ok(Some(Err(e))) => {
                        debug!(session_id = self.id, error = %e, "read failed");
                        break CloseReason::ReadError;
                    }
                    Ok(Some(Ok(Message::Pong(_)))) => deadline = Instant::now() + window,
                    // Server-push only; anything else the client sends is discarded.
                    Ok(Some(Ok(_))) => {}
                },
            }
        };

        self.teardown(reason).await;
    }

    async fn teardown(&self, reason: CloseReason) {
        let won = self
            .state
            .compare_exchange(
                SessionState::Open.as_u8(),
                SessionState::Closing.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !won {
            self.terminated.cancelled().await;
            return;
        }

        self.shutdown.cancel();

        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.user_id, self.id).await;
        }

        {
            let mut writer = self.writer.lock().await;
            match time::timeout(self.config.write_wait, writer.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(session_id = self.id, error = %e, "close frame not sent"),
                Err(_) => debug!(session_id = self.id, "close timed out"),
            }
        }

        self.state
            .store(SessionState::Closed.as_u8(), Ordering::Release);
        self.metrics.record_session_closed();
        self.terminated.cancel();

        info!(
            session_id = self.id,
            user_id = %self.user_id,
            reason = %reason,
            "session closed"
        );
    }
}
