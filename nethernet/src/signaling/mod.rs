use crate::error::Result;
use std::fmt;
use std::future::Future;

pub mod websocket;

pub use websocket::WebSocketSignaling;

/// Duplex text channel carrying signaling messages.
///
/// Every method takes `&self` so one task can wait in [`recv_line`] while
/// another sends. Implementations serialize concurrent sends so that each
/// call produces exactly one intact frame on the wire.
///
/// [`recv_line`]: SignalingTransport::recv_line
pub trait SignalingTransport: Send + Sync {
    /// Writes one signaling message as a single frame.
    fn send_line(&self, line: &str) -> impl Future<Output = Result<()>> + Send;

    /// Waits for the next complete text frame.
    ///
    /// Returns `NethernetError::ConnectionClosed` once the remote end closes or
    /// [`close`](SignalingTransport::close) is called.
    fn recv_line(&self) -> impl Future<Output = Result<String>> + Send;

    /// Closes the channel. Calling it again is a no-op.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Authentication material supplied by the login flow.
#[derive(Clone, Default)]
pub struct Credentials {
    pub bearer_token: String,
    /// Extra handshake headers
    pub headers: Vec<(String, String)>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: token.into(),
            headers: Vec::new(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer_token", &"<redacted>")
            .field("headers", &self.headers)
            .finish()
    }
}
