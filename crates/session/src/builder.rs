//! Builder pattern for constructing a [`GatewayClient`].

use std::sync::Arc;
use std::time::Duration;

use pb_domain::config::Config;
use pb_protocol::{intents, ConnectionProperties};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backoff::BackoffPolicy;
use crate::client::GatewayClient;
use crate::rest::{MessageSender, RestPoster};
use crate::sender::{Credentials, OutboundSender};
use crate::session::{ConnectionState, Session};
use crate::types::GatewayError;

/// Fluent builder for [`GatewayClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use pb_session::GatewayClientBuilder;
/// let client = GatewayClientBuilder::new()
///     .token("bot-token")
///     .channel_id("1234567890")
///     .client_name("pixelbot")
///     .tick_interval(std::time::Duration::from_millis(250))
///     .build()
///     .unwrap();
/// ```
pub struct GatewayClientBuilder {
    pub(crate) gateway_url: String,
    pub(crate) token: Option<String>,
    pub(crate) intents: u64,
    pub(crate) channel_id: String,
    pub(crate) api_base_url: String,
    pub(crate) client_name: String,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) tick_interval: Duration,
    pub(crate) hello_timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) message_sender: Option<Arc<dyn MessageSender>>,
    pub(crate) shutdown: Option<CancellationToken>,
}

impl GatewayClientBuilder {
    pub fn new() -> Self {
        Self {
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".into(),
            token: None,
            intents: intents::DEFAULT,
            channel_id: String::new(),
            api_base_url: "https://discord.com/api/v10".into(),
            client_name: "pixelbot".into(),
            backoff: BackoffPolicy::default(),
            tick_interval: Duration::from_millis(250),
            hello_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            message_sender: None,
            shutdown: None,
        }
    }

    /// Seed every setting from a loaded [`Config`].  The token is passed
    /// separately because it never lives in the config file.
    pub fn from_config(cfg: &Config, token: impl Into<String>) -> Self {
        Self::new()
            .gateway_url(cfg.discord.gateway_url.clone())
            .token(token)
            .intents(cfg.discord.intents)
            .channel_id(cfg.discord.channel_id.clone())
            .api_base_url(cfg.discord.api_base_url.clone())
            .client_name(cfg.discord.device_name.clone())
            .backoff(BackoffPolicy::from(&cfg.backoff))
            .tick_interval(Duration::from_millis(cfg.session.tick_ms))
            .hello_timeout(Duration::from_secs(cfg.session.hello_timeout_secs))
            .connect_timeout(Duration::from_secs(cfg.session.connect_timeout_secs))
            .request_timeout(Duration::from_millis(cfg.discord.request_timeout_ms))
    }

    // ── Required ─────────────────────────────────────────────────────

    /// Set the bot token used for Identify and REST posts.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The one channel whose messages are accepted, and where replies go.
    pub fn channel_id(mut self, id: impl Into<String>) -> Self {
        self.channel_id = id.into();
        self
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Override the gateway WebSocket URL, query string included.
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn intents(mut self, intents: u64) -> Self {
        self.intents = intents;
        self
    }

    /// Name reported as browser and device in the Identify properties.
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    // ── Behavior ─────────────────────────────────────────────────────

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    /// How often heartbeat and reconnect deadlines are checked (default 250ms).
    pub fn tick_interval(mut self, d: Duration) -> Self {
        self.tick_interval = d;
        self
    }

    pub fn hello_timeout(mut self, d: Duration) -> Self {
        self.hello_timeout = d;
        self
    }

    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Timeout for REST posts (default 10s).  Ignored when a custom
    /// [`MessageSender`] is supplied.
    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }

    /// Replace the REST poster, e.g. with a recording fake in tests.
    pub fn message_sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.message_sender = Some(sender);
        self
    }

    /// Share an existing cancellation token instead of creating one.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Build the [`GatewayClient`].
    pub fn build(self) -> Result<GatewayClient, GatewayError> {
        let token = match self.token {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(GatewayError::Config("token is required".into())),
        };
        if self.channel_id.trim().is_empty() {
            return Err(GatewayError::Config("channel_id is required".into()));
        }
        if !(self.gateway_url.starts_with("ws://") || self.gateway_url.starts_with("wss://")) {
            return Err(GatewayError::Config(format!(
                "gateway_url must be ws:// or wss://, got {:?}",
                self.gateway_url
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(GatewayError::Config("tick_interval must be > 0".into()));
        }

        let poster: Arc<dyn MessageSender> = match self.message_sender {
            Some(sender) => sender,
            None => Arc::new(RestPoster::new(
                &self.api_base_url,
                &self.channel_id,
                token.clone(),
                self.request_timeout,
            )?),
        };

        let shutdown = self.shutdown.unwrap_or_default();
        let credentials = Credentials {
            token,
            intents: self.intents,
            properties: ConnectionProperties::for_client(&self.client_name),
        };
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(GatewayClient {
            gateway_url: self.gateway_url,
            session: Session::new(self.channel_id, self.backoff, self.hello_timeout),
            sender: OutboundSender::new(credentials, shutdown.clone()),
            poster,
            tick_interval: self.tick_interval,
            connect_timeout: self.connect_timeout,
            state_tx,
            shutdown,
        })
    }
}

impl Default for GatewayClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
