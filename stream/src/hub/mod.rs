//! Delivery hub.
//!
//! Keeps every open WebSocket session per user and pushes notifications to
//! all of them.
//!
//! # Components
//!
//! - [`session`]: one connection, its keepalive and its teardown
//! - [`registry`]: user → sessions mapping
//! - [`writer`]: the outbound frame path sessions write through
//! - [`handler`]: the HTTP upgrade endpoint
//! - [`metrics`]: hub counters

pub mod handler;
pub mod metrics;
pub mod registry;
pub mod session;
pub mod writer;

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::future::join_all;
use futures::Stream;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, HubConfig};
use crate::error::HubError;
use crate::messages::UserId;

pub use handler::ws_handler;
pub use metrics::{HubMetrics, HubMetricsSnapshot};
pub use registry::Registry;
pub use session::{CloseReason, Session, SessionId, SessionState};
pub use writer::{Frame, FrameWriter};

/// Handle to the delivery hub.
///
/// Cloning is cheap; every clone refers to the same sessions.
#[derive(Debug, Clone)]
pub struct Hub {
    config: HubConfig,
    registry: Arc<Registry>,
    metrics: Arc<HubMetrics>,
}

impl Hub {
    /// Creates a hub with no sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not pass [`HubConfig::validate`].
    pub fn new(config: HubConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            registry: Arc::new(Registry::new()),
            metrics: Arc::new(HubMetrics::new()),
        })
    }

    /// Returns the keepalive configuration.
    #[must_use]
    pub const fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Returns the hub metrics.
    #[must_use]
    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    /// Returns true once [`Hub::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// Admits a connection for `user_id` and starts its loops.
    ///
    /// `writer` is the outbound half of the connection and `frames` the inbound
    /// half. The call returns as soon as the session is registered.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has been closed.
    pub async fn connect<W, S, E>(
        &self,
        user_id: UserId,
        writer: W,
        frames: S,
    ) -> Result<Arc<Session>, HubError>
    where
        W: FrameWriter + 'static,
        S: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
        E: fmt::Display + Send + 'static,
    {
        if self.is_closed() {
            return Err(HubError::Closed);
        }

        let session = Session::new(
            user_id,
            Box::new(writer),
            self.config,
            Arc::downgrade(&self.registry),
            Arc::clone(&self.metrics),
        );
        self.metrics.record_session_opened();

        if !self.registry.register(Arc::clone(&session)).await {
            session.close().await;
            return Err(HubError::Closed);
        }

        session.start(frames);
        info!(session_id = session.id(), user_id = %user_id, "session opened");
        Ok(session)
    }

    /// Sends `message` to every open session of `user_id`.
    ///
    /// Delivery is best effort: a session whose write fails is torn down and
    /// the message is dropped for it, without affecting the others. Does
    /// nothing once the hub is closed.
    pub async fn notify<M>(&self, user_id: UserId, message: &M)
    where
        M: Serialize + Sync + ?Sized,
    {
        if self.is_closed() {
            debug!(user_id = %user_id, "hub closed, notification dropped");
            return;
        }

        let sessions = self.registry.snapshot_for(user_id).await;
        if sessions.is_empty() {
            debug!(user_id = %user_id, "no open sessions");
            return;
        }

        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "notification could not be serialized");
                return;
            }
        };

        let results = join_all(
            sessions
                .iter()
                .map(|session| session.deliver_text(&payload)),
        )
        .await;
        for (session, result) in sessions.iter().zip(results) {
            if let Err(e) = result {
                debug!(
                    session_id = session.id(),
                    user_id = %user_id,
                    error = %e,
                    "notification dropped"
                );
            }
        }
    }

    /// Tears down every session and stops admitting new ones.
    pub async fn close(&self) {
        let closed = self.registry.close_all().await;
        info!(sessions = closed, "hub closed");
    }

    /// Returns the open sessions of a user.
    pub async fn sessions_for(&self, user_id: UserId) -> Vec<Arc<Session>> {
        self.registry.snapshot_for(user_id).await
    }

    /// Returns the number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.registry.session_count().await
    }
}
