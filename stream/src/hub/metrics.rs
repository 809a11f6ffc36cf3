//! Hub metrics tracking.
//!
//! Provides atomic counters for monitoring sessions and deliveries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Metrics for the delivery hub.
#[derive(Debug)]
pub struct HubMetrics {
    /// Total sessions admitted.
    sessions_opened: AtomicU64,

    /// Total sessions torn down.
    sessions_closed: AtomicU64,

    /// Total notifications written to a session.
    messages_delivered: AtomicU64,

    /// Total notifications dropped for a session.
    delivery_failures: AtomicU64,

    /// Total pings written.
    pings_sent: AtomicU64,

    /// Total pings that failed to write.
    ping_failures: AtomicU64,

    /// Total sessions evicted for a missing pong.
    liveness_timeouts: AtomicU64,

    /// Total rejected upgrade requests.
    upgrade_failures: AtomicU64,

    /// Start time for uptime.
    start_time: Instant,
}

impl Default for HubMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HubMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            pings_sent: AtomicU64::new(0),
            ping_failures: AtomicU64::new(0),
            liveness_timeouts: AtomicU64::new(0),
            upgrade_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a session admitted.
    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a session torn down.
    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a delivered notification.
    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped notification.
    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a ping written.
    pub fn record_ping_sent(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a ping that failed.
    pub fn record_ping_failure(&self) {
        self.ping_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a liveness timeout.
    pub fn record_liveness_timeout(&self) {
        self.liveness_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected upgrade.
    pub fn record_upgrade_failure(&self) {
        self.upgrade_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total sessions opened.
    #[must_use]
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    /// Returns the total sessions closed.
    #[must_use]
    pub fn sessions_closed(&self) -> u64 {
        self.sessions_closed.load(Ordering::Relaxed)
    }

    /// Returns the currently open sessions.
    #[must_use]
    pub fn active_sessions(&self) -> u64 {
        self.sessions_opened()
            .saturating_sub(self.sessions_closed())
    }

    /// Returns the total messages delivered.
    #[must_use]
    pub fn messages_delivered(&self) -> u64 {
        self.messages_delivered.load(Ordering::Relaxed)
    }

    /// Returns the total delivery failures.
    #[must_use]
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    /// Returns the total pings sent.
    #[must_use]
    pub fn pings_sent(&self) -> u64 {
        self.pings_sent.load(Ordering::Relaxed)
    }

    /// Returns the total ping failures.
    #[must_use]
    pub fn ping_failures(&self) -> u64 {
        self.ping_failures.load(Ordering::Relaxed)
    }

    /// Returns the total liveness timeouts.
    #[must_use]
    pub fn liveness_timeouts(&self) -> u64 {
        self.liveness_timeouts.load(Ordering::Relaxed)
    }

    /// Returns the total upgrade failures.
    #[must_use]
    pub fn upgrade_failures(&self) -> u64 {
        self.upgrade_failures.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            sessions_opened: self.sessions_opened(),
            sessions_closed: self.sessions_closed(),
            active_sessions: self.active_sessions(),
            messages_delivered: self.messages_delivered(),
            delivery_failures: self.delivery_failures(),
            pings_sent: self.pings_sent(),
            ping_failures: self.ping_failures(),
            liveness_timeouts: self.liveness_timeouts(),
            upgrade_failures: self.upgrade_failures(),
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

/// A point-in-time snapshot of hub metrics.
#[derive(Debug, Clone, Serialize)]
pub struct HubMetricsSnapshot {
    /// Total sessions opened.
    pub sessions_opened: u64,
    /// Total sessions closed.
    pub sessions_closed: u64,
    /// Open sessions.
    pub active_sessions: u64,
    /// Messages delivered.
    pub messages_delivered: u64,
    /// Delivery failures.
    pub delivery_failures: u64,
    /// Pings sent.
    pub pings_sent: u64,
    /// Ping failures.
    pub ping_failures: u64,
    /// Liveness timeouts.
    pub liveness_timeouts: u64,
    /// Upgrade failures.
    pub upgrade_failures: u64,
    /// Uptime in seconds.
    pub uptime_secs: u64,
}
