//! Error type and the dispatch-sink seam.

/// Receives accepted, de-duplicated user messages.
///
/// Called in arrival order from a dedicated task, so a slow
/// implementation delays later messages but never the gateway session.
///
/// # Example
///
/// ```rust,no_run
/// use pb_session::DispatchSink;
///
/// struct Printer;
///
/// #[async_trait::async_trait]
/// impl DispatchSink for Printer {
///     async fn dispatch(&self, text: String) {
///         println!("command: {text}");
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait DispatchSink: Send + Sync + 'static {
    async fn dispatch(&self, text: String);
}

/// Errors raised while assembling a [`GatewayClient`](crate::GatewayClient).
///
/// Once running, the client never fails: transport trouble only
/// schedules the next connect attempt.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("config: {0}")]
    Config(String),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}
