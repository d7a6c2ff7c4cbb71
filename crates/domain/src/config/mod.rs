mod backoff;
mod discord;
mod logging;
mod session;

pub use backoff::*;
pub use discord::*;
pub use logging::*;
pub use session::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a TOML document; absent sections and fields take their defaults.
    pub fn from_toml_str(raw: &str) -> crate::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse the file at `path`.  A missing file yields
    /// [`Config::default`].
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.  The bot token is
    /// checked through [`DiscordConfig::resolve_token`], so the result
    /// depends on the process environment.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.discord.channel_id.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "discord.channel_id".into(),
                message: "target channel id must not be empty".into(),
            });
        }

        if self.discord.resolve_token().is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "discord.token_env".into(),
                message: format!("env var {} is unset or empty", self.discord.token_env),
            });
        }

        if !self.discord.gateway_url.starts_with("ws://")
            && !self.discord.gateway_url.starts_with("wss://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "discord.gateway_url".into(),
                message: "gateway url must use ws:// or wss://".into(),
            });
        }

        if self.discord.api_base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "discord.api_base_url".into(),
                message: "api_base_url must not be empty".into(),
            });
        }

        if self.session.tick_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "session.tick_ms".into(),
                message: "tick interval must be greater than 0".into(),
            });
        }

        if self.backoff.detail_base_secs > self.backoff.max_secs
            || self.backoff.bare_base_secs > self.backoff.max_secs
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backoff.max_secs".into(),
                message: "cap must not be smaller than either base delay".into(),
            });
        }

        if self.backoff.bare_base_secs < self.backoff.detail_base_secs {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "backoff.bare_base_secs".into(),
                message: "disconnects without a payload will back off less than ordinary ones"
                    .into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
