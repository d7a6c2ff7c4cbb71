use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Discord connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Environment variable holding the bot token.  The token itself is
    /// never stored in the config file.
    #[serde(default = "d_token_env")]
    pub token_env: String,
    /// The only channel whose messages are treated as commands, and the
    /// channel replies are posted to.
    #[serde(default)]
    pub channel_id: String,
    #[serde(default = "d_gateway_url")]
    pub gateway_url: String,
    /// REST base, without trailing slash.
    #[serde(default = "d_api_base_url")]
    pub api_base_url: String,
    /// Gateway intents bitmask sent with Identify.
    #[serde(default = "d_intents")]
    pub intents: u64,
    /// Reported as `device` and `browser` in the Identify properties.
    #[serde(default = "d_device_name")]
    pub device_name: String,
    /// Timeout for REST message posts.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token_env: d_token_env(),
            channel_id: String::new(),
            gateway_url: d_gateway_url(),
            api_base_url: d_api_base_url(),
            intents: d_intents(),
            device_name: d_device_name(),
            request_timeout_ms: d_request_timeout_ms(),
        }
    }
}

impl DiscordConfig {
    /// Read the bot token from the configured environment variable.
    /// Empty values count as unset.
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
    }
}

fn d_token_env() -> String {
    "DISCORD_BOT_TOKEN".into()
}

fn d_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".into()
}

fn d_api_base_url() -> String {
    "https://discord.com/api/v10".into()
}

// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
fn d_intents() -> u64 {
    (1 << 0) | (1 << 9) | (1 << 15)
}

fn d_device_name() -> String {
    "pixelbot".into()
}

fn d_request_timeout_ms() -> u64 {
    10_000
}
