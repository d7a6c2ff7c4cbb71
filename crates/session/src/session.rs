//! The session state machine.
//!
//! [`Session`] owns every piece of mutable connection state and never
//! touches the network itself.  Transport events, inbound frames and the
//! periodic tick go in; a list of [`Effect`]s comes out for the driver in
//! [`client`](crate::client) to carry out.  That keeps every transition
//! testable with nothing but a clock value.

use std::fmt;
use std::time::Duration;

use pb_protocol::{event, opcode, Frame, HelloPayload, MessageCreate, ReadyPayload};
use tokio::time::Instant;

use crate::backoff::BackoffPolicy;
use crate::heartbeat::HeartbeatTimer;

/// Where the connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    SocketOpen,
    /// The socket is up; waiting for Hello.
    AwaitingHello,
    /// Identify or Resume sent; waiting for READY or RESUMED.
    Authenticating,
    Ready,
}

impl ConnectionState {
    /// States in which the remote has sent Hello and frames flow both ways.
    fn is_established(self) -> bool {
        matches!(self, Self::Authenticating | Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::SocketOpen => "socket_open",
            Self::AwaitingHello => "awaiting_hello",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// Something the driver must do on the session's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the transport.  `resume_url` is set when the remote handed us
    /// a dedicated endpoint for resuming this session.
    Connect { resume_url: Option<String> },
    SendHeartbeat { seq: Option<u64> },
    SendIdentify,
    SendResume { session_id: String, seq: u64 },
    /// Forward accepted message text to the dispatch sink.
    Dispatch(String),
    /// Close the transport without reporting a disconnect back.
    Close,
}

/// Connection state, session identity and liveness for one gateway client.
///
/// Created once and kept for the life of the process; only its fields
/// are reset across reconnects.
#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
    /// Empty when there is nothing to resume.
    session_id: String,
    /// Last accepted dispatch sequence; 0 when none has been seen.
    sequence: u64,
    resume_url: Option<String>,
    heartbeat: HeartbeatTimer,
    consecutive_failures: u32,
    last_deduped_message_id: String,
    target_channel_id: String,
    backoff: BackoffPolicy,
    hello_timeout: Duration,
    socket_opened_at: Option<Instant>,
    /// No connect attempt may start before this instant.
    next_connect_at: Option<Instant>,
    closed: bool,
}

impl Session {
    pub fn new(
        target_channel_id: impl Into<String>,
        backoff: BackoffPolicy,
        hello_timeout: Duration,
    ) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session_id: String::new(),
            sequence: 0,
            resume_url: None,
            heartbeat: HeartbeatTimer::new(),
            consecutive_failures: 0,
            last_deduped_message_id: String::new(),
            target_channel_id: target_channel_id.into(),
            backoff,
            hello_timeout,
            socket_opened_at: None,
            next_connect_at: None,
            closed: false,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_deduped_message_id(&self) -> &str {
        &self.last_deduped_message_id
    }

    pub fn heartbeat(&self) -> &HeartbeatTimer {
        &self.heartbeat
    }

    pub fn next_connect_at(&self) -> Option<Instant> {
        self.next_connect_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Resume is only worth attempting with both an identity and a
    /// sequence to continue from.
    pub fn can_resume(&self) -> bool {
        !self.session_id.is_empty() && self.sequence > 0
    }

    // ── Transport events ─────────────────────────────────────────────

    /// Start a connect attempt if one is allowed at `now`.
    ///
    /// Attempts start only from `Disconnected`, once the backoff deadline
    /// has passed, and never after [`shutdown`](Self::shutdown).
    pub fn open_transport(&mut self, now: Instant) -> Option<Effect> {
        if self.closed || self.state != ConnectionState::Disconnected {
            return None;
        }
        if self.next_connect_at.is_some_and(|at| now < at) {
            return None;
        }
        self.state = ConnectionState::SocketOpen;
        self.next_connect_at = None;
        let resume_url = if self.can_resume() {
            self.resume_url.clone()
        } else {
            None
        };
        tracing::info!(
            resuming = self.can_resume(),
            attempt = self.consecutive_failures + 1,
            "opening gateway transport"
        );
        Some(Effect::Connect { resume_url })
    }

    pub fn on_transport_connected(&mut self, now: Instant) {
        if self.closed || self.state != ConnectionState::SocketOpen {
            tracing::warn!(state = %self.state, "unexpected transport connect, ignoring");
            return;
        }
        self.state = ConnectionState::AwaitingHello;
        self.heartbeat.reset();
        self.socket_opened_at = Some(now);
    }

    /// The transport dropped or failed to open.  `had_detail` is false
    /// when the close carried no payload at all, which earns the longer
    /// backoff.
    ///
    /// Ignored when already disconnected: a close we initiated ourselves
    /// has been accounted for.
    pub fn on_transport_closed(&mut self, had_detail: bool, now: Instant) {
        if self.closed || self.state == ConnectionState::Disconnected {
            return;
        }
        self.disconnect(had_detail, now);
    }

    /// A control frame could not be written.  Handled exactly like a
    /// transport failure so liveness state never goes stale.
    pub fn on_send_failed(&mut self, now: Instant) {
        self.on_transport_closed(true, now);
    }

    /// Stop for good.  Returns `Close` if a transport is open.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        let had_transport = self.state != ConnectionState::Disconnected;
        self.state = ConnectionState::Disconnected;
        self.heartbeat.reset();
        self.socket_opened_at = None;
        self.next_connect_at = None;
        if had_transport {
            vec![Effect::Close]
        } else {
            Vec::new()
        }
    }

    // ── Timer ────────────────────────────────────────────────────────

    /// Periodic check: reconnect deadline, Hello timeout, heartbeat and
    /// zombie detection.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        match self.state {
            ConnectionState::Disconnected => self.open_transport(now).into_iter().collect(),
            ConnectionState::SocketOpen => Vec::new(),
            ConnectionState::AwaitingHello => {
                let expired = self
                    .socket_opened_at
                    .is_some_and(|at| now.saturating_duration_since(at) >= self.hello_timeout);
                if expired {
                    tracing::warn!(
                        timeout_ms = self.hello_timeout.as_millis() as u64,
                        "no Hello from gateway"
                    );
                    self.disconnect(true, now);
                    vec![Effect::Close]
                } else {
                    Vec::new()
                }
            }
            ConnectionState::Authenticating | ConnectionState::Ready => {
                if self.heartbeat.is_zombie(now) {
                    tracing::warn!("heartbeat not acknowledged, dropping zombie connection");
                    self.disconnect(true, now);
                    vec![Effect::Close]
                } else if self.heartbeat.is_due(now) {
                    vec![self.heartbeat_effect(now)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    // ── Inbound frames ───────────────────────────────────────────────

    /// Route one decoded inbound frame.
    pub fn on_frame(&mut self, frame: Frame, now: Instant) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        match frame.opcode {
            opcode::HELLO => self.on_hello(&frame, now),
            opcode::DISPATCH => self.on_dispatch(&frame),
            opcode::HEARTBEAT if self.state.is_established() => {
                tracing::debug!("gateway requested a heartbeat");
                vec![self.heartbeat_effect(now)]
            }
            opcode::HEARTBEAT_ACK if self.state.is_established() => {
                self.heartbeat.record_ack(now);
                tracing::trace!("heartbeat acknowledged");
                Vec::new()
            }
            opcode::RECONNECT if self.state.is_established() => {
                tracing::info!("gateway requested reconnect");
                self.state = ConnectionState::Disconnected;
                self.heartbeat.reset();
                self.socket_opened_at = None;
                self.next_connect_at = Some(now);
                vec![Effect::Close]
            }
            opcode::INVALID_SESSION if self.state.is_established() => {
                let resumable = frame.resumable();
                tracing::info!(resumable, "invalid session");
                if !resumable {
                    self.clear_session();
                }
                self.disconnect(true, now);
                vec![Effect::Close]
            }
            op => {
                tracing::debug!(op, state = %self.state, "ignoring frame");
                Vec::new()
            }
        }
    }

    fn on_hello(&mut self, frame: &Frame, now: Instant) -> Vec<Effect> {
        if self.state != ConnectionState::AwaitingHello {
            tracing::warn!(state = %self.state, "unexpected Hello, ignoring");
            return Vec::new();
        }
        let hello: HelloPayload = match frame.payload_as() {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed Hello");
                return Vec::new();
            }
        };

        self.heartbeat
            .set_interval(Duration::from_millis(hello.heartbeat_interval));
        self.state = ConnectionState::Authenticating;
        tracing::debug!(interval_ms = hello.heartbeat_interval, "received Hello");

        let mut effects = vec![self.heartbeat_effect(now)];
        if self.can_resume() {
            tracing::info!(session_id = %self.session_id, seq = self.sequence, "resuming session");
            effects.push(Effect::SendResume {
                session_id: self.session_id.clone(),
                seq: self.sequence,
            });
        } else {
            // A fresh session numbers its events from scratch.
            self.clear_session();
            tracing::info!("identifying");
            effects.push(Effect::SendIdentify);
        }
        effects
    }

    fn on_dispatch(&mut self, frame: &Frame) -> Vec<Effect> {
        if !self.state.is_established() {
            tracing::debug!(state = %self.state, "dispatch before Hello, ignoring");
            return Vec::new();
        }
        if let Some(seq) = frame.sequence {
            self.accept_sequence(seq);
        }

        match frame.event() {
            Some(event::READY) => self.on_ready(frame),
            Some(event::RESUMED) => {
                if self.state == ConnectionState::Authenticating {
                    tracing::info!(session_id = %self.session_id, seq = self.sequence, "session resumed");
                    self.become_ready();
                }
                Vec::new()
            }
            Some(event::MESSAGE_CREATE) => self.on_message_create(frame),
            Some(other) => {
                tracing::trace!(event = other, "dispatch observed");
                Vec::new()
            }
            None => {
                tracing::debug!("dispatch without event type");
                Vec::new()
            }
        }
    }

    fn on_ready(&mut self, frame: &Frame) -> Vec<Effect> {
        if self.state != ConnectionState::Authenticating {
            tracing::warn!(state = %self.state, "unexpected READY, ignoring");
            return Vec::new();
        }
        let ready: ReadyPayload = match frame.payload_as() {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed READY");
                return Vec::new();
            }
        };

        self.session_id = ready.session_id;
        self.resume_url = ready
            .resume_gateway_url
            .filter(|u| u.starts_with("wss://") || u.starts_with("ws://"));

        tracing::info!(
            session_id = %self.session_id,
            user_id = %ready.user.id,
            username = %ready.user.username,
            guilds = ready.guilds.len(),
            "gateway session ready"
        );
        for guild in &ready.guilds {
            tracing::debug!(guild_id = %guild.id, "attached to guild");
        }

        self.become_ready();
        Vec::new()
    }

    fn on_message_create(&mut self, frame: &Frame) -> Vec<Effect> {
        let msg: MessageCreate = match frame.payload_as() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed MESSAGE_CREATE");
                return Vec::new();
            }
        };

        if msg.channel_id != self.target_channel_id {
            tracing::trace!(channel_id = %msg.channel_id, "message outside target channel");
            return Vec::new();
        }
        if msg.author.bot {
            tracing::debug!(author_id = %msg.author.id, "ignoring bot message");
            return Vec::new();
        }
        if msg.id == self.last_deduped_message_id {
            tracing::debug!(message_id = %msg.id, "message already processed");
            return Vec::new();
        }
        if msg.content.trim().is_empty() {
            tracing::debug!(message_id = %msg.id, "empty message");
            return Vec::new();
        }

        tracing::info!(
            message_id = %msg.id,
            author_id = %msg.author.id,
            "forwarding message"
        );
        self.last_deduped_message_id = msg.id;
        vec![Effect::Dispatch(msg.content)]
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Sequence numbers only move forward.
    fn accept_sequence(&mut self, seq: u64) {
        if seq <= self.sequence {
            tracing::debug!(seq, current = self.sequence, "stale sequence, ignoring");
            return;
        }
        if self.sequence > 0 && seq > self.sequence + 1 {
            tracing::warn!(
                expected = self.sequence + 1,
                got = seq,
                "gap in dispatch sequence"
            );
        }
        self.sequence = seq;
    }

    fn heartbeat_effect(&mut self, now: Instant) -> Effect {
        self.heartbeat.mark_sent(now);
        Effect::SendHeartbeat {
            seq: (self.sequence > 0).then_some(self.sequence),
        }
    }

    fn become_ready(&mut self) {
        self.state = ConnectionState::Ready;
        self.consecutive_failures = 0;
        self.next_connect_at = None;
    }

    fn clear_session(&mut self) {
        self.session_id.clear();
        self.sequence = 0;
        self.resume_url = None;
    }

    fn disconnect(&mut self, had_detail: bool, now: Instant) {
        self.state = ConnectionState::Disconnected;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = self
            .backoff
            .next_delay(self.consecutive_failures, had_detail);
        self.next_connect_at = Some(now + delay);
        self.heartbeat.reset();
        self.socket_opened_at = None;
        tracing::warn!(
            failures = self.consecutive_failures,
            had_detail,
            delay_ms = delay.as_millis() as u64,
            resumable = self.can_resume(),
            "gateway disconnected, reconnect scheduled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CHANNEL: &str = "chan-1";

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn session() -> Session {
        Session::new(CHANNEL, BackoffPolicy::default(), secs(30))
    }

    fn frame(op: u32, d: serde_json::Value, s: Option<u64>, t: Option<&str>) -> Frame {
        Frame {
            opcode: op,
            payload: d,
            sequence: s,
            event_type: t.map(str::to_owned),
        }
    }

    fn hello(interval: u64) -> Frame {
        frame(opcode::HELLO, json!({ "heartbeat_interval": interval }), None, None)
    }

    fn ready(session_id: &str, seq: u64) -> Frame {
        frame(
            opcode::DISPATCH,
            json!({
                "session_id": session_id,
                "user": { "id": "bot-1", "username": "pixelbot" },
                "guilds": [{ "id": "g1" }, { "id": "g2" }],
            }),
            Some(seq),
            Some(event::READY),
        )
    }

    fn message(id: &str, channel: &str, bot: bool, content: &str, seq: u64) -> Frame {
        frame(
            opcode::DISPATCH,
            json!({
                "id": id,
                "channel_id": channel,
                "author": { "id": "user-1", "bot": bot },
                "content": content,
            }),
            Some(seq),
            Some(event::MESSAGE_CREATE),
        )
    }

    /// Drive a fresh session to `AwaitingHello`.
    fn connected(s: &mut Session, now: Instant) {
        assert!(matches!(s.tick(now).as_slice(), [Effect::Connect { .. }]));
        s.on_transport_connected(now);
        assert_eq!(s.state(), ConnectionState::AwaitingHello);
    }

    /// Drive a fresh session all the way to `Ready`.
    fn ready_session(now: Instant) -> Session {
        let mut s = session();
        connected(&mut s, now);
        s.on_frame(hello(41_250), now);
        s.on_frame(ready("abc123", 1), now);
        assert!(s.is_ready());
        s
    }

    #[test]
    fn unknown_opcode_is_ignored() {
        let now = Instant::now();
        let mut s = ready_session(now);
        assert!(s.on_frame(frame(300, json!(null), None, None), now).is_empty());
        assert!(s.is_ready());
        assert_eq!(s.sequence(), 1);
    }

    #[test]
    fn initial_state() {
        let s = session();
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert!(!s.is_ready());
        assert_eq!(s.sequence(), 0);
        assert!(s.session_id().is_empty());
    }

    #[test]
    fn first_tick_opens_transport() {
        let now = Instant::now();
        let mut s = session();
        assert_eq!(s.tick(now), vec![Effect::Connect { resume_url: None }]);
        assert_eq!(s.state(), ConnectionState::SocketOpen);
        // A second tick while connecting does nothing.
        assert!(s.tick(now).is_empty());
    }

    #[test]
    fn hello_then_identify_then_ready() {
        let now = Instant::now();
        let mut s = session();
        connected(&mut s, now);

        let effects = s.on_frame(hello(41_250), now);
        assert_eq!(
            effects,
            vec![Effect::SendHeartbeat { seq: None }, Effect::SendIdentify]
        );
        assert_eq!(s.state(), ConnectionState::Authenticating);
        assert_eq!(s.heartbeat().interval(), Some(Duration::from_millis(41_250)));
        assert_eq!(s.heartbeat().last_sent(), Some(now));

        assert!(s.on_frame(ready("abc123", 1), now).is_empty());
        assert_eq!(s.state(), ConnectionState::Ready);
        assert_eq!(s.session_id(), "abc123");
        assert_eq!(s.sequence(), 1);
        assert_eq!(s.consecutive_failures(), 0);
    }

    #[test]
    fn ready_resets_failure_count() {
        let now = Instant::now();
        let mut s = session();
        connected(&mut s, now);
        s.on_transport_closed(true, now);
        assert_eq!(s.consecutive_failures(), 1);

        let later = now + secs(15);
        connected(&mut s, later);
        s.on_frame(hello(1_000), later);
        s.on_frame(ready("abc123", 1), later);
        assert_eq!(s.consecutive_failures(), 0);
    }

    #[test]
    fn identify_when_session_id_missing_even_with_sequence() {
        let now = Instant::now();
        let mut s = session();
        s.sequence = 5;
        connected(&mut s, now);
        let effects = s.on_frame(hello(1_000), now);
        assert_eq!(effects[1], Effect::SendIdentify);
        assert_eq!(s.sequence(), 0);
    }

    #[test]
    fn identify_when_sequence_is_zero() {
        let now = Instant::now();
        let mut s = session();
        s.session_id = "abc123".into();
        connected(&mut s, now);
        let effects = s.on_frame(hello(1_000), now);
        assert_eq!(effects[1], Effect::SendIdentify);
    }

    #[test]
    fn bare_close_in_ready_backs_off_sixty_and_keeps_session() {
        let now = Instant::now();
        let mut s = ready_session(now);
        s.on_frame(message("m1", CHANNEL, false, "status", 2), now);

        s.on_transport_closed(false, now);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.next_connect_at(), Some(now + secs(60)));
        assert_eq!(s.session_id(), "abc123");
        assert_eq!(s.sequence(), 2);
        assert_eq!(s.heartbeat().interval(), None);

        assert!(s.tick(now + secs(59)).is_empty());
        assert!(matches!(
            s.tick(now + secs(60)).as_slice(),
            [Effect::Connect { .. }]
        ));
    }

    #[test]
    fn close_with_detail_backs_off_fifteen() {
        let now = Instant::now();
        let mut s = ready_session(now);
        s.on_transport_closed(true, now);
        assert_eq!(s.next_connect_at(), Some(now + secs(15)));
    }

    #[test]
    fn consecutive_failures_double_the_delay() {
        let now = Instant::now();
        let mut s = session();
        let mut t = now;
        let mut delays = Vec::new();
        for _ in 0..4 {
            assert!(matches!(s.tick(t).as_slice(), [Effect::Connect { .. }]));
            s.on_transport_closed(true, t);
            let at = s.next_connect_at().unwrap();
            delays.push((at - t).as_secs());
            t = at;
        }
        assert_eq!(delays, vec![15, 30, 60, 120]);
    }

    #[test]
    fn reconnect_after_drop_resumes_with_retained_identity() {
        let now = Instant::now();
        let mut s = ready_session(now);
        s.on_frame(message("m1", CHANNEL, false, "status", 2), now);
        s.on_transport_closed(false, now);

        let later = now + secs(60);
        connected(&mut s, later);
        let effects = s.on_frame(hello(41_250), later);
        assert_eq!(
            effects,
            vec![
                Effect::SendHeartbeat { seq: Some(2) },
                Effect::SendResume {
                    session_id: "abc123".into(),
                    seq: 2
                },
            ]
        );

        let resumed = frame(opcode::DISPATCH, json!(null), None, Some(event::RESUMED));
        s.on_frame(resumed, later);
        assert!(s.is_ready());
        assert_eq!(s.consecutive_failures(), 0);
    }

    #[test]
    fn resume_uses_dedicated_url_from_ready() {
        let now = Instant::now();
        let mut s = session();
        connected(&mut s, now);
        s.on_frame(hello(1_000), now);
        let ready = frame(
            opcode::DISPATCH,
            json!({
                "session_id": "abc123",
                "resume_gateway_url": "wss://resume.example",
                "user": { "id": "bot-1" },
            }),
            Some(1),
            Some(event::READY),
        );
        s.on_frame(ready, now);
        s.on_transport_closed(true, now);

        assert_eq!(
            s.tick(now + secs(15)),
            vec![Effect::Connect {
                resume_url: Some("wss://resume.example".into())
            }]
        );
    }

    #[test]
    fn invalid_session_not_resumable_clears_identity() {
        let now = Instant::now();
        let mut s = ready_session(now);
        s.on_transport_closed(true, now);
        let later = now + secs(15);
        connected(&mut s, later);
        s.on_frame(hello(1_000), later);
        assert_eq!(s.state(), ConnectionState::Authenticating);

        let effects = s.on_frame(frame(opcode::INVALID_SESSION, json!(false), None, None), later);
        assert_eq!(effects, vec![Effect::Close]);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert!(s.session_id().is_empty());
        assert_eq!(s.sequence(), 0);
        assert!(!s.can_resume());
    }

    #[test]
    fn invalid_session_resumable_keeps_identity() {
        let now = Instant::now();
        let mut s = ready_session(now);
        s.on_frame(frame(opcode::INVALID_SESSION, json!(true), None, None), now);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.session_id(), "abc123");
        assert!(s.can_resume());
    }

    #[test]
    fn reconnect_opcode_keeps_session_and_connects_at_once() {
        let now = Instant::now();
        let mut s = ready_session(now);
        let effects = s.on_frame(frame(opcode::RECONNECT, json!(null), None, None), now);
        assert_eq!(effects, vec![Effect::Close]);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.session_id(), "abc123");
        assert_eq!(s.consecutive_failures(), 0);

        // Our own close must not count as a second disconnect.
        s.on_transport_closed(false, now);
        assert_eq!(s.consecutive_failures(), 0);
        assert!(matches!(s.tick(now).as_slice(), [Effect::Connect { .. }]));
    }

    #[test]
    fn heartbeat_ack_recorded() {
        let now = Instant::now();
        let mut s = ready_session(now);
        let later = now + Duration::from_millis(50);
        s.on_frame(frame(opcode::HEARTBEAT_ACK, json!(null), None, None), later);
        assert_eq!(s.heartbeat().last_ack(), Some(later));
    }

    #[test]
    fn heartbeat_sent_when_due_with_latest_sequence() {
        let now = Instant::now();
        let mut s = ready_session(now);
        s.on_frame(frame(opcode::HEARTBEAT_ACK, json!(null), None, None), now);
        s.on_frame(message("m1", CHANNEL, false, "red", 2), now);

        let almost = now + Duration::from_millis(37_000);
        assert!(s.tick(almost).is_empty());

        let due = now + Duration::from_millis(37_125);
        assert_eq!(s.tick(due), vec![Effect::SendHeartbeat { seq: Some(2) }]);
    }

    #[test]
    fn gateway_heartbeat_request_answered_immediately() {
        let now = Instant::now();
        let mut s = ready_session(now);
        let effects = s.on_frame(frame(opcode::HEARTBEAT, json!(null), None, None), now);
        assert_eq!(effects, vec![Effect::SendHeartbeat { seq: Some(1) }]);
    }

    #[test]
    fn unacknowledged_heartbeat_is_a_zombie() {
        let now = Instant::now();
        let mut s = ready_session(now);
        // The post-Hello heartbeat was never acked.
        let due = now + Duration::from_millis(40_000);
        assert_eq!(s.tick(due), vec![Effect::Close]);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.consecutive_failures(), 1);
        assert_eq!(s.session_id(), "abc123");
    }

    #[test]
    fn hello_timeout_disconnects() {
        let now = Instant::now();
        let mut s = session();
        connected(&mut s, now);
        assert!(s.tick(now + secs(29)).is_empty());
        assert_eq!(s.tick(now + secs(30)), vec![Effect::Close]);
        assert_eq!(s.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn duplicate_message_forwarded_once() {
        let now = Instant::now();
        let mut s = ready_session(now);
        assert_eq!(
            s.on_frame(message("m1", CHANNEL, false, "status", 2), now),
            vec![Effect::Dispatch("status".into())]
        );
        assert!(s.on_frame(message("m1", CHANNEL, false, "status", 3), now).is_empty());
        assert_eq!(s.last_deduped_message_id(), "m1");
    }

    #[test]
    fn bot_and_foreign_channel_messages_never_forwarded() {
        let now = Instant::now();
        let mut s = ready_session(now);
        assert!(s.on_frame(message("m1", CHANNEL, true, "status", 2), now).is_empty());
        assert!(s.on_frame(message("m2", "other", false, "status", 3), now).is_empty());
        assert!(s.on_frame(message("m3", CHANNEL, false, "   ", 4), now).is_empty());
        assert!(s.last_deduped_message_id().is_empty());
        // Sequence still advances for frames that are filtered out.
        assert_eq!(s.sequence(), 4);
    }

    #[test]
    fn malformed_message_dropped_without_state_change() {
        let now = Instant::now();
        let mut s = ready_session(now);
        let bad = frame(opcode::DISPATCH, json!({ "id": 5 }), Some(2), Some(event::MESSAGE_CREATE));
        assert!(s.on_frame(bad, now).is_empty());
        assert!(s.is_ready());
    }

    #[test]
    fn stale_sequence_never_regresses() {
        let now = Instant::now();
        let mut s = ready_session(now);
        s.on_frame(message("m1", CHANNEL, false, "a", 5), now);
        s.on_frame(message("m2", CHANNEL, false, "b", 3), now);
        assert_eq!(s.sequence(), 5);
    }

    #[test]
    fn guild_create_observed_only() {
        let now = Instant::now();
        let mut s = ready_session(now);
        let g = frame(opcode::DISPATCH, json!({ "id": "g1" }), Some(2), Some(event::GUILD_CREATE));
        assert!(s.on_frame(g, now).is_empty());
        assert!(s.is_ready());
        assert_eq!(s.sequence(), 2);
    }

    #[test]
    fn frames_before_hello_are_ignored() {
        let now = Instant::now();
        let mut s = session();
        connected(&mut s, now);
        assert!(s.on_frame(ready("abc123", 1), now).is_empty());
        assert!(s.on_frame(frame(opcode::HEARTBEAT, json!(null), None, None), now).is_empty());
        assert_eq!(s.state(), ConnectionState::AwaitingHello);
        assert_eq!(s.sequence(), 0);
    }

    #[test]
    fn second_hello_is_ignored() {
        let now = Instant::now();
        let mut s = ready_session(now);
        assert!(s.on_frame(hello(5_000), now).is_empty());
        assert_eq!(s.heartbeat().interval(), Some(Duration::from_millis(41_250)));
    }

    #[test]
    fn connect_only_from_disconnected() {
        let now = Instant::now();
        let mut s = ready_session(now);
        assert!(s.open_transport(now).is_none());
        s.on_transport_closed(true, now);
        assert!(s.open_transport(now).is_none(), "backoff must gate the attempt");
        assert!(s.open_transport(now + secs(15)).is_some());
        assert!(s.open_transport(now + secs(15)).is_none());
    }

    #[test]
    fn failed_connect_counts_as_disconnect() {
        let now = Instant::now();
        let mut s = session();
        s.tick(now);
        s.on_transport_closed(true, now);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.consecutive_failures(), 1);
    }

    #[test]
    fn send_failure_takes_disconnect_path() {
        let now = Instant::now();
        let mut s = ready_session(now);
        s.on_send_failed(now);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert_eq!(s.next_connect_at(), Some(now + secs(15)));
    }

    #[test]
    fn shutdown_closes_and_silences() {
        let now = Instant::now();
        let mut s = ready_session(now);
        assert_eq!(s.shutdown(), vec![Effect::Close]);
        assert!(s.is_closed());
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert!(s.tick(now + secs(600)).is_empty());
        assert!(s.on_frame(message("m9", CHANNEL, false, "status", 9), now).is_empty());
        assert!(s.shutdown().is_empty());
    }

    #[test]
    fn shutdown_while_disconnected_has_nothing_to_close() {
        let mut s = session();
        assert!(s.shutdown().is_empty());
        assert!(s.open_transport(Instant::now()).is_none());
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::AwaitingHello.to_string(), "awaiting_hello");
        assert_eq!(ConnectionState::Ready.to_string(), "ready");
    }
}
