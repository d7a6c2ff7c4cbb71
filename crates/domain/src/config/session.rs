use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of the engine tick that checks heartbeat and reconnect timers.
    #[serde(default = "d_tick_ms")]
    pub tick_ms: u64,
    /// How long to wait for Hello after the socket opens.
    #[serde(default = "d_hello_timeout_secs")]
    pub hello_timeout_secs: u64,
    /// Upper bound on a single transport connect.
    #[serde(default = "d_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_ms: d_tick_ms(),
            hello_timeout_secs: d_hello_timeout_secs(),
            connect_timeout_secs: d_connect_timeout_secs(),
        }
    }
}

fn d_tick_ms() -> u64 {
    250
}

fn d_hello_timeout_secs() -> u64 {
    30
}

fn d_connect_timeout_secs() -> u64 {
    30
}
