//! One-shot message posting over the REST API.
//!
//! Independent of the gateway session: a post succeeds or fails on its
//! own, is never retried, and never disturbs the socket.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::types::GatewayError;

/// Posts text to the target channel.
#[async_trait]
pub trait MessageSender: Send + Sync + 'static {
    /// `true` when the remote accepted the message.
    async fn send(&self, text: &str) -> bool;
}

/// [`MessageSender`] backed by the channel-messages REST endpoint.
#[derive(Debug, Clone)]
pub struct RestPoster {
    http: Client,
    url: String,
    token: String,
}

impl RestPoster {
    pub fn new(
        api_base_url: &str,
        channel_id: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(timeout).build()?;
        let url = format!(
            "{}/channels/{}/messages",
            api_base_url.trim_end_matches('/'),
            channel_id
        );
        Ok(Self {
            http,
            url,
            token: token.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `{"content": text}`.  Any non-2xx status or transport error
    /// is logged and reported as `false`.
    pub async fn post_message(&self, text: &str) -> bool {
        let result = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(status = resp.status().as_u16(), "message posted");
                true
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!(status, body = %body, "message post rejected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "message post failed");
                false
            }
        }
    }
}

#[async_trait]
impl MessageSender for RestPoster {
    async fn send(&self, text: &str) -> bool {
        self.post_message(text).await
    }
}
