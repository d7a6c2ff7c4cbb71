//! `pb-session`: a persistent gateway session for a channel-command bot.
//!
//! The crate keeps one authenticated WebSocket session alive against a
//! Discord-style gateway, resumes it across drops, and hands user
//! messages from a single channel to a [`DispatchSink`].  Replies go out
//! over the REST API through a [`MessageSender`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  GatewayClient (tokio task)                                  │
//! │                                                              │
//! │   socket ──frames──▶ Session ──Effects──▶ OutboundSender     │
//! │   tick ────────────▶ (state machine)      connect / close    │
//! │                          │                                   │
//! │                          └──Dispatch──▶ mpsc ─▶ DispatchSink │
//! └──────────────────────────────────────────────────────────────┘
//!        GatewayHandle: state(), is_ready(), send(), shutdown()
//! ```
//!
//! # Connection flow
//!
//! 1. Connect WS once the backoff deadline has passed
//! 2. Wait for Hello (op 10) and adopt its heartbeat interval
//! 3. Send one heartbeat, then Resume (op 6) if a session is known,
//!    otherwise Identify (op 2)
//! 4. On `READY` / `RESUMED`: state is Ready, failure count resets
//! 5. Main loop:
//!    - heartbeat every interval, drop the socket if an ack never came
//!    - forward `MESSAGE_CREATE` text from the target channel
//! 6. On disconnect: wait `min(base * 2^(n-1), max)` and go back to 1

pub mod backoff;
pub mod builder;
pub mod client;
pub mod heartbeat;
pub mod rest;
pub mod sender;
pub mod session;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use backoff::BackoffPolicy;
pub use builder::GatewayClientBuilder;
pub use client::{GatewayClient, GatewayHandle};
pub use heartbeat::HeartbeatTimer;
pub use rest::{MessageSender, RestPoster};
pub use sender::{Credentials, OutboundSender};
pub use session::{ConnectionState, Effect, Session};
pub use types::{DispatchSink, GatewayError};

// Re-export the wire types so applications never need pb-protocol directly.
pub use pb_protocol;
