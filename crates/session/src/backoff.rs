//! Reconnect delay policy.

use std::time::Duration;

use pb_domain::config::BackoffConfig;

/// Decides how long to wait before the next connect attempt.
///
/// Pure: the failure counter lives in the session, not here.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// First delay after a disconnect that carried a payload.
    pub detail_base: Duration,
    /// First delay after a close with no payload at all.  Such closes
    /// usually mean rate limiting or a rejected configuration.
    pub bare_base: Duration,
    /// Cap applied after doubling.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            detail_base: Duration::from_secs(15),
            bare_base: Duration::from_secs(60),
            max_delay: Duration::from_secs(600),
        }
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(cfg: &BackoffConfig) -> Self {
        Self {
            detail_base: Duration::from_secs(cfg.detail_base_secs),
            bare_base: Duration::from_secs(cfg.bare_base_secs),
            max_delay: Duration::from_secs(cfg.max_secs),
        }
    }
}

impl BackoffPolicy {
    /// Delay before attempt number `failure_count` (1-based; 0 is treated
    /// as 1): `min(base * 2^(failure_count - 1), max_delay)`.
    pub fn next_delay(&self, failure_count: u32, disconnect_had_detail: bool) -> Duration {
        let base = if disconnect_had_detail {
            self.detail_base
        } else {
            self.bare_base
        };
        let exponent = failure_count.saturating_sub(1).min(31);
        base.checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}
