//! Gateway client: drives a [`Session`] over a real WebSocket.
//!
//! One task does everything that touches the session: it reads inbound
//! frames, runs the periodic tick, opens and closes the socket, and
//! writes control frames.  Backoff waits are deadlines checked by the
//! tick, never sleeps, so the loop stays responsive while disconnected.
//! Accepted messages go to the [`DispatchSink`] on a separate task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use pb_protocol::decode;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::rest::MessageSender;
use crate::sender::OutboundSender;
use crate::session::{ConnectionState, Effect, Session};
use crate::types::DispatchSink;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A fully-configured gateway client.
///
/// Create via [`GatewayClientBuilder`](crate::builder::GatewayClientBuilder).
pub struct GatewayClient {
    pub(crate) gateway_url: String,
    pub(crate) session: Session,
    pub(crate) sender: OutboundSender,
    pub(crate) poster: Arc<dyn MessageSender>,
    pub(crate) tick_interval: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) state_tx: watch::Sender<ConnectionState>,
    pub(crate) shutdown: CancellationToken,
}

/// What woke the loop up.
enum LoopEvent {
    Shutdown,
    Tick,
    Inbound(Option<Result<Message, tungstenite::Error>>),
}

impl GatewayClient {
    /// Start a new builder.
    pub fn builder() -> crate::builder::GatewayClientBuilder {
        crate::builder::GatewayClientBuilder::new()
    }

    /// A cloneable handle for status queries, message posting and shutdown.
    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            state: self.state_tx.subscribe(),
            poster: self.poster.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Run until the shutdown token is cancelled.  Connection failures are
    /// never fatal; they only schedule the next attempt.
    pub async fn run(mut self, sink: Arc<dyn DispatchSink>) {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel::<String>();
        let dispatcher = tokio::spawn(run_dispatcher(sink, dispatch_rx));

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut socket: Option<WsStream> = None;

        tracing::info!(url = %self.gateway_url, "gateway client starting");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => LoopEvent::Shutdown,
                msg = next_inbound(&mut socket) => LoopEvent::Inbound(msg),
                _ = ticker.tick() => LoopEvent::Tick,
            };

            let effects = match event {
                LoopEvent::Shutdown => break,
                LoopEvent::Tick => self.session.tick(Instant::now()),
                LoopEvent::Inbound(msg) => self.on_inbound(msg, &mut socket),
            };
            self.apply(effects, &mut socket, &dispatch_tx).await;
            self.publish_state();
        }

        tracing::info!("gateway client shutting down");
        // The sender shares the shutdown token, so no control frame can be
        // written from here on.
        self.session.shutdown();
        if let Some(mut ws) = socket.take() {
            if let Err(e) = ws.close(None).await {
                tracing::debug!(error = %e, "error closing gateway socket");
            }
        }
        dispatcher.abort();
        self.publish_state();
    }

    /// Same as [`run`](Self::run), spawned onto the runtime.
    pub fn spawn(self, sink: Arc<dyn DispatchSink>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(sink))
    }

    fn on_inbound(
        &mut self,
        msg: Option<Result<Message, tungstenite::Error>>,
        socket: &mut Option<WsStream>,
    ) -> Vec<Effect> {
        let now = Instant::now();
        match msg {
            Some(Ok(Message::Text(text))) => match decode(&text) {
                Ok(frame) => self.session.on_frame(frame, now),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping inbound frame");
                    Vec::new()
                }
            },
            Some(Ok(Message::Close(frame))) => {
                match &frame {
                    Some(f) => tracing::info!(
                        code = u16::from(f.code),
                        reason = %f.reason,
                        "gateway closed connection"
                    ),
                    None => tracing::info!("gateway closed connection without payload"),
                }
                *socket = None;
                self.session.on_transport_closed(frame.is_some(), now);
                Vec::new()
            }
            Some(Ok(_)) => Vec::new(),
            // Resets and drops without a close handshake carry no payload.
            Some(Err(e)) => {
                tracing::warn!(error = %e, "gateway read error");
                *socket = None;
                self.session.on_transport_closed(false, now);
                Vec::new()
            }
            None => {
                tracing::info!("gateway stream ended");
                *socket = None;
                self.session.on_transport_closed(false, now);
                Vec::new()
            }
        }
    }

    async fn apply(
        &mut self,
        effects: Vec<Effect>,
        socket: &mut Option<WsStream>,
        dispatch_tx: &mpsc::UnboundedSender<String>,
    ) {
        for effect in effects {
            match effect {
                Effect::Connect { resume_url } => self.connect(socket, resume_url).await,
                Effect::Dispatch(text) => {
                    if dispatch_tx.send(text).is_err() {
                        tracing::error!("dispatch task is gone, dropping message");
                    }
                }
                Effect::Close => {
                    if let Some(mut ws) = socket.take() {
                        if let Err(e) = ws.close(None).await {
                            tracing::debug!(error = %e, "error closing gateway socket");
                        }
                    }
                }
                Effect::SendHeartbeat { seq } => {
                    let Some(ws) = socket.as_mut() else { continue };
                    if !self.sender.send_heartbeat(ws, seq).await {
                        self.fail_transport(socket);
                    }
                }
                Effect::SendIdentify => {
                    let Some(ws) = socket.as_mut() else { continue };
                    if !self.sender.send_identify(ws).await {
                        self.fail_transport(socket);
                    }
                }
                Effect::SendResume { session_id, seq } => {
                    let Some(ws) = socket.as_mut() else { continue };
                    if !self.sender.send_resume(ws, &session_id, seq).await {
                        self.fail_transport(socket);
                    }
                }
            }
        }
    }

    async fn connect(&mut self, socket: &mut Option<WsStream>, resume_url: Option<String>) {
        let url = match resume_url {
            Some(base) => with_gateway_query(&base),
            None => self.gateway_url.clone(),
        };
        tracing::info!(url = %url, "connecting to gateway");

        let attempt = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        );
        let result = tokio::select! {
            r = attempt => r,
            _ = self.shutdown.cancelled() => return,
        };

        match result {
            Ok(Ok((ws, _response))) => {
                *socket = Some(ws);
                self.session.on_transport_connected(Instant::now());
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "gateway connect failed");
                self.session.on_transport_closed(false, Instant::now());
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "gateway connect timed out"
                );
                self.session.on_transport_closed(false, Instant::now());
            }
        }
    }

    /// A write failed: drop the socket and take the disconnect path.
    fn fail_transport(&mut self, socket: &mut Option<WsStream>) {
        *socket = None;
        self.session.on_send_failed(Instant::now());
    }

    fn publish_state(&self) {
        let state = self.session.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!(from = %current, to = %state, "connection state changed");
                *current = state;
                true
            }
        });
    }
}

/// Next message from the socket, or never when there is none.
async fn next_inbound(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

/// Hand accepted messages to the sink one at a time, in order.  A
/// panicking sink loses that message only.
async fn run_dispatcher(sink: Arc<dyn DispatchSink>, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        let result = AssertUnwindSafe(sink.dispatch(text)).catch_unwind().await;
        if result.is_err() {
            tracing::error!("dispatch sink panicked");
        }
    }
}

/// Resume endpoints come without the version and encoding query.
fn with_gateway_query(base: &str) -> String {
    if base.contains('?') {
        base.to_owned()
    } else {
        format!("{}/?v=10&encoding=json", base.trim_end_matches('/'))
    }
}

// ── Handle ───────────────────────────────────────────────────────────

/// Status accessors and the outbound-message capability, shareable with
/// the rest of the application.
#[derive(Clone)]
pub struct GatewayHandle {
    state: watch::Receiver<ConnectionState>,
    poster: Arc<dyn MessageSender>,
    shutdown: CancellationToken,
}

impl GatewayHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// True only while the session is in the Ready state.
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Post `text` to the target channel.  Works whatever the session
    /// state; failures are reported, never retried.
    pub async fn send(&self, text: &str) -> bool {
        self.poster.send(text).await
    }

    /// Wait until the connection reaches `target`.  Returns `false` if the
    /// client stopped first.
    pub async fn wait_for_state(&self, target: ConnectionState) -> bool {
        self.state.clone().wait_for(|s| *s == target).await.is_ok()
    }

    /// Stop the client.  The socket is closed and no further frames are
    /// sent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[async_trait::async_trait]
impl MessageSender for GatewayHandle {
    async fn send(&self, text: &str) -> bool {
        self.poster.send(text).await
    }
}
