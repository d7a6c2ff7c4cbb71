use serde::{Deserialize, Serialize};

/// Op 10 payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Milliseconds between heartbeats, as dictated by the remote.
    pub heartbeat_interval: u64,
}

/// Op 2 payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
}

/// Client description sent with Identify.  `browser` is the client name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl ConnectionProperties {
    /// Properties for the current platform under the given client name.
    pub fn for_client(name: &str) -> Self {
        Self {
            os: std::env::consts::OS.to_owned(),
            browser: name.to_owned(),
            device: name.to_owned(),
        }
    }
}

/// Op 6 payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// `READY` dispatch payload (only the fields the engine reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    pub user: ReadyUser,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: String,
}

/// `MESSAGE_CREATE` dispatch payload (only the fields the engine reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreate {
    pub id: String,
    pub channel_id: String,
    pub author: MessageAuthor,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: String,
    #[serde(default)]
    pub username: String,
    /// Absent for human accounts.
    #[serde(default)]
    pub bot: bool,
}
