//! WebSocket signaling transport.

use super::{Credentials, SignalingTransport};
use crate::error::{NethernetError, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on sending the close frame during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Signaling over one WebSocket connection.
///
/// The write half sits behind its own mutex, so concurrent [`send_line`]
/// calls are written one whole frame at a time, in lock acquisition order.
///
/// [`send_line`]: SignalingTransport::send_line
pub struct WebSocketSignaling {
    endpoint: Url,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl WebSocketSignaling {
    /// Opens the WebSocket, attaching `Authorization: Bearer <token>` and the
    /// credential headers to the handshake.
    ///
    /// Fails with `NethernetError::Connect` if the handshake is rejected, the
    /// host cannot be reached, or `timeout` elapses.
    pub async fn connect(endpoint: &Url, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| NethernetError::Connect(format!("invalid request for {}: {}", endpoint, e)))?;

        let headers = request.headers_mut();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credentials.bearer_token))
            .map_err(|_| NethernetError::Connect("bearer token is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        for (name, value) in &credentials.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NethernetError::Connect(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| NethernetError::Connect(format!("invalid header value: {}", e)))?;
            headers.insert(name, value);
        }

        let (ws, response) = match tokio::time::timeout(timeout, connect_async(request)).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                return Err(NethernetError::Connect(format!(
                    "websocket handshake with {} failed: {}",
                    endpoint, e
                )));
            }
            Err(_) => {
                return Err(NethernetError::Connect(format!(
                    "timed out after {:?} connecting to {}",
                    timeout, endpoint
                )));
            }
        };

        tracing::info!(url = %endpoint, status = %response.status(), "signaling websocket connected");

        let (sink, stream) = ws.split();
        Ok(Self {
            endpoint: endpoint.clone(),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Whether the connection has been closed by either side.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

fn is_disconnect(err: &WsError) -> bool {
    matches!(
        err,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

impl SignalingTransport for WebSocketSignaling {
    async fn send_line(&self, line: &str) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(NethernetError::Send("connection closed".to_string()));
        }

        let mut sink = self.sink.lock().await;
        sink.send(Message::text(line.to_owned())).await.map_err(|e| {
            if is_disconnect(&e) {
                self.shutdown.cancel();
            }
            NethernetError::Send(e.to_string())
        })?;

        tracing::debug!(len = line.len(), "signaling frame sent");
        Ok(())
    }

    async fn recv_line(&self) -> Result<String> {
        let mut stream = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(NethernetError::ConnectionClosed),
            guard = self.stream.lock() => guard,
        };

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(NethernetError::ConnectionClosed),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(len = text.len(), "signaling frame received");
                    return Ok(text.as_str().to_owned());
                }
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec()).map_err(|_| {
                        NethernetError::Recv("binary frame is not valid UTF-8".to_string())
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "signaling websocket closed by remote");
                    self.shutdown.cancel();
                    return Err(NethernetError::ConnectionClosed);
                }
                // ping, pong, raw frames
                Some(Ok(_)) => continue,
                Some(Err(e)) if is_disconnect(&e) => {
                    tracing::debug!("signaling websocket closed: {}", e);
                    self.shutdown.cancel();
                    return Err(NethernetError::ConnectionClosed);
                }
                Some(Err(e)) => {
                    tracing::warn!("signaling websocket error: {}", e);
                    return Err(NethernetError::Recv(e.to_string()));
                }
                None => {
                    self.shutdown.cancel();
                    return Err(NethernetError::ConnectionClosed);
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutdown.cancel();

        let closing = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if is_disconnect(&e) => {}
            Ok(Err(e)) => tracing::debug!("error while closing signaling websocket: {}", e),
            Err(_) => tracing::debug!("timed out sending websocket close frame"),
        }

        tracing::info!(url = %self.endpoint, "signaling websocket closed");
        Ok(())
    }
}
