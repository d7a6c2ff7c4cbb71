//! Liveness bookkeeping for one gateway connection.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks the negotiated heartbeat interval and when we last sent and
/// were acknowledged.
///
/// A heartbeat is due once `0.9 * interval` has elapsed since the last
/// send, so it always lands inside the remote's own timeout window even
/// when the loop tick runs late.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatTimer {
    interval: Option<Duration>,
    last_sent: Option<Instant>,
    last_ack: Option<Instant>,
    awaiting_ack: bool,
}

impl HeartbeatTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the interval from the latest Hello.  Only the most recent
    /// value is trusted.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = Some(interval);
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub fn last_ack(&self) -> Option<Instant> {
        self.last_ack
    }

    /// True when a heartbeat should be sent at `now`.  Never due before
    /// an interval has been negotiated.
    pub fn is_due(&self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        match self.last_sent {
            None => true,
            Some(sent) => now.saturating_duration_since(sent) >= interval * 9 / 10,
        }
    }

    /// True when the next heartbeat is due but the previous one was
    /// never acknowledged: the connection is alive at the socket level
    /// only.
    pub fn is_zombie(&self, now: Instant) -> bool {
        self.awaiting_ack && self.is_due(now)
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
        self.awaiting_ack = true;
    }

    pub fn record_ack(&mut self, now: Instant) {
        self.last_ack = Some(now);
        self.awaiting_ack = false;
    }

    /// Forget everything, including the interval.  Called whenever the
    /// transport opens or drops.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
