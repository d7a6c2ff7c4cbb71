//! Outbound control frames over the persistent transport.

use futures_util::{Sink, SinkExt};
use pb_protocol::{encode, opcode, ConnectionProperties, IdentifyPayload, ResumePayload};
use serde::Serialize;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// What Identify and Resume authenticate with.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
}

/// Builds heartbeat, Identify and Resume frames and writes them to the
/// socket.
///
/// Every send reports plain success or failure; the caller turns a
/// failure into a disconnect.  Once `closed` is cancelled nothing more
/// is written.
pub struct OutboundSender {
    credentials: Credentials,
    closed: CancellationToken,
}

impl OutboundSender {
    pub fn new(credentials: Credentials, closed: CancellationToken) -> Self {
        Self {
            credentials,
            closed,
        }
    }

    pub async fn send_heartbeat<S>(&self, sink: &mut S, seq: Option<u64>) -> bool
    where
        S: Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        self.transmit(sink, opcode::HEARTBEAT, &seq).await
    }

    pub async fn send_identify<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        let identify = IdentifyPayload {
            token: self.credentials.token.clone(),
            intents: self.credentials.intents,
            properties: self.credentials.properties.clone(),
        };
        self.transmit(sink, opcode::IDENTIFY, &identify).await
    }

    pub async fn send_resume<S>(&self, sink: &mut S, session_id: &str, seq: u64) -> bool
    where
        S: Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        let resume = ResumePayload {
            token: self.credentials.token.clone(),
            session_id: session_id.to_owned(),
            seq,
        };
        self.transmit(sink, opcode::RESUME, &resume).await
    }

    async fn transmit<S, P>(&self, sink: &mut S, op: u32, payload: &P) -> bool
    where
        S: Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
        P: Serialize,
    {
        if self.closed.is_cancelled() {
            tracing::debug!(op, "sender closed, dropping frame");
            return false;
        }
        let json = match encode(op, payload) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(op, error = %e, "failed to encode outbound frame");
                return false;
            }
        };
        match sink.send(Message::Text(json)).await {
            Ok(()) => {
                tracing::trace!(op, "sent frame");
                true
            }
            Err(e) => {
                tracing::warn!(op, error = %e, "failed to send frame");
                false
            }
        }
    }
}
