use serde::{Deserialize, Serialize};

/// Reconnect delays, in seconds.
///
/// The first retry after a disconnect that carried a payload waits
/// `detail_base_secs`; one that closed with no payload at all waits
/// `bare_base_secs`.  Each further consecutive failure doubles the delay,
/// capped at `max_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "d_detail_base")]
    pub detail_base_secs: u64,
    #[serde(default = "d_bare_base")]
    pub bare_base_secs: u64,
    #[serde(default = "d_max")]
    pub max_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            detail_base_secs: d_detail_base(),
            bare_base_secs: d_bare_base(),
            max_secs: d_max(),
        }
    }
}

fn d_detail_base() -> u64 {
    15
}

fn d_bare_base() -> u64 {
    60
}

fn d_max() -> u64 {
    600
}
