use crate::config::SessionConfig;
use crate::engine::{PeerEngine, RtcEngine};
use crate::error::{NethernetError, Result};
use crate::negotiation::{Coordinator, NegotiationSession, Phase};
use crate::signaling::{SignalingTransport, WebSocketSignaling};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// A signaling session with a remote NetherNet peer.
///
/// Owns the signaling transport and the peer engine for one connection
/// attempt. Dropping a session that was not closed cancels any negotiation
/// still in flight and releases the engine and transport on the current
/// runtime.
pub struct Session<T: SignalingTransport + 'static, E: PeerEngine + 'static> {
    coordinator: Coordinator<T, E>,
    cancel: CancellationToken,
    await_initial_message: bool,
    initial_message_timeout: Duration,
    closed: RwLock<bool>,
}

impl Session<WebSocketSignaling, RtcEngine> {
    /// Opens the signaling WebSocket and negotiates a WebRTC connection.
    ///
    /// Returns once the peer engine reports connectivity.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nethernet::{Session, SessionConfig};
    ///
    /// # async fn example() -> nethernet::Result<()> {
    /// let config = SessionConfig::new("1234567890", "token")?;
    /// let session = Session::connect(config).await?;
    /// session.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        let transport =
            WebSocketSignaling::connect(&endpoint, &config.credentials(), config.connect_timeout).await?;

        let engine = match RtcEngine::new(&config.ice_servers).await {
            Ok(engine) => engine,
            Err(e) => {
                let _ = transport.close().await;
                return Err(e);
            }
        };

        Self::connect_with(config, transport, engine).await
    }
}

impl<T: SignalingTransport + 'static, E: PeerEngine + 'static> Session<T, E> {
    /// Creates an idle session over an already open transport.
    pub fn new(config: &SessionConfig, transport: T, engine: E) -> Self {
        let cancel = CancellationToken::new();
        let coordinator = Coordinator::new(
            config.session_id.clone(),
            Arc::new(transport),
            Arc::new(engine),
            config.negotiation(),
        )
        .with_cancellation(cancel.clone());

        Self {
            coordinator,
            cancel,
            await_initial_message: config.await_initial_message,
            initial_message_timeout: config.connect_timeout,
            closed: RwLock::new(false),
        }
    }

    /// Like [`Session::connect`], with a caller-supplied transport and engine.
    pub async fn connect_with(config: SessionConfig, transport: T, engine: E) -> Result<Self> {
        let mut session = Self::new(&config, transport, engine);
        session.negotiate().await?;
        Ok(session)
    }

    /// Token that cancels [`Session::negotiate`].
    ///
    /// A cancelled negotiation ends in [`Phase::Closed`] with the engine and
    /// transport closed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receives the server's initial frame, then runs the negotiation.
    pub async fn negotiate(&mut self) -> Result<()> {
        if self.is_closed().await {
            return Err(NethernetError::InvalidState("session is closed".to_string()));
        }

        if self.await_initial_message && self.coordinator.phase() == Phase::Idle {
            if let Err(e) = self.receive_initial_message().await {
                self.coordinator.abort(&e).await;
                return Err(e);
            }
        }

        self.coordinator.run().await
    }

    async fn receive_initial_message(&self) -> Result<()> {
        let transport = self.coordinator.transport();
        let received = tokio::select! {
            _ = self.cancel.cancelled() => return Err(NethernetError::Cancelled),
            received = tokio::time::timeout(self.initial_message_timeout, transport.recv_line()) => received,
        };

        match received {
            Ok(line) => {
                let line = line?;
                tracing::info!(message = %line, "received initial message");
            }
            Err(_) => tracing::debug!("no initial message from signaling service"),
        }
        Ok(())
    }

    /// Closes the engine, then the transport.
    ///
    /// Safe to call more than once and in any phase.
    pub async fn close(&self) -> Result<()> {
        let mut closed = self.closed.write().await;
        if *closed {
            return Ok(());
        }
        *closed = true;

        self.cancel.cancel();
        let engine_closed = self.coordinator.engine().close().await;
        self.coordinator.transport().close().await?;
        engine_closed?;
        tracing::info!(session_id = %self.session_id(), "session closed");
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }

    /// Current phase; an explicitly closed session reports `Closed` unless it
    /// had already failed.
    pub async fn phase(&self) -> Phase {
        let phase = self.coordinator.phase();
        if self.is_closed().await && !phase.is_finished() {
            Phase::Closed
        } else {
            phase
        }
    }

    pub fn session_id(&self) -> &str {
        &self.coordinator.session().session_id
    }

    /// Descriptions and candidate bookkeeping of the negotiation.
    pub fn negotiation(&self) -> &NegotiationSession {
        self.coordinator.session()
    }

    pub fn engine(&self) -> &Arc<E> {
        self.coordinator.engine()
    }

    pub fn transport(&self) -> &Arc<T> {
        self.coordinator.transport()
    }
}

impl<T: SignalingTransport + 'static, E: PeerEngine + 'static> Drop for Session<T, E> {
    fn drop(&mut self) {
        self.cancel.cancel();

        let closed = self.closed.try_read().map(|closed| *closed).unwrap_or(true);
        if closed || self.coordinator.phase().is_finished() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("session dropped outside a runtime, resources not closed");
            return;
        };

        let engine = self.coordinator.engine().clone();
        let transport = self.coordinator.transport().clone();
        handle.spawn(async move {
            if let Err(e) = engine.close().await {
                tracing::debug!("engine close failed: {}", e);
            }
            if let Err(e) = transport.close().await {
                tracing::debug!("transport close failed: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ConnectivityState;
    use crate::negotiation::testing::*;

    fn config() -> SessionConfig {
        SessionConfig::new("session-1", "token")
            .unwrap()
            .with_answer_timeout(Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_with_reaches_connected() {
        let (transport, tx) = ScriptedTransport::new();
        tx.send("{\"type\":\"welcome\"}".to_string()).unwrap();
        tx.send(answer_line("session-1")).unwrap();
        tx.send(host_candidate_line("10.0.0.2", 5000)).unwrap();

        let engine = FakeEngine::new().report_after(1, ConnectivityState::Connected);
        let session = Session::connect_with(config(), transport, engine).await.unwrap();

        assert_eq!(session.phase().await, Phase::Connected);
        assert_eq!(session.session_id(), "session-1");
        assert!(session.negotiation().remote_description.is_some());
        assert_eq!(session.engine().applied().len(), 1);

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.phase().await, Phase::Closed);
        assert_eq!(session.engine().close_calls(), 1);
        assert_eq!(session.transport().close_calls(), 1);
    }

    #[tokio::test]
    async fn test_close_after_failed() {
        let (transport, tx) = ScriptedTransport::new();
        let answer = fake_answer().replace("a=mid:0", "a=mid:9");
        tx.send(format!("CONNECTRESPONSE session-1 {}", answer)).unwrap();

        let config = config().with_initial_message(false);
        let mut session = Session::new(&config, transport, FakeEngine::new());
        let result = session.negotiate().await;

        assert!(matches!(result, Err(NethernetError::Negotiation(_))));
        assert_eq!(session.phase().await, Phase::Failed);

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.phase().await, Phase::Failed);
        assert!(matches!(
            session.negotiate().await,
            Err(NethernetError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_initial_message_closed_connection() {
        let (transport, tx) = ScriptedTransport::new();
        drop(tx);

        let result = Session::connect_with(config(), transport, FakeEngine::new()).await;
        assert!(matches!(result, Err(NethernetError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_initial_message_timeout_proceeds() {
        let (transport, tx) = ScriptedTransport::new();
        let late = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            late.send(answer_line("session-1")).unwrap();
            late.send(host_candidate_line("10.0.0.2", 5000)).unwrap();
        });

        let config = config()
            .with_connect_timeout(Duration::from_millis(100))
            .unwrap();
        let engine = FakeEngine::new().report_after(1, ConnectivityState::Connected);
        let session = Session::connect_with(config, transport, engine).await.unwrap();

        assert_eq!(session.phase().await, Phase::Connected);
        assert_eq!(session.engine().applied().len(), 1);
        assert!(session.transport().sent()[0].starts_with("CONNECTREQUEST session-1 "));
        session.close().await.unwrap();
        drop(tx);
    }

    #[tokio::test]
    async fn test_cancel_during_negotiate() {
        let (transport, _tx) = ScriptedTransport::new();
        let config = config().with_initial_message(false);
        let mut session = Session::new(&config, transport, FakeEngine::new());

        let token = session.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result = session.negotiate().await;
        assert!(matches!(result, Err(NethernetError::Cancelled)));
        assert_eq!(session.phase().await, Phase::Closed);
        assert_eq!(session.engine().close_calls(), 1);
        assert_eq!(session.transport().close_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_initial_message() {
        let (transport, _tx) = ScriptedTransport::new();
        let mut session = Session::new(&config(), transport, FakeEngine::new());

        let token = session.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result = session.negotiate().await;
        assert!(matches!(result, Err(NethernetError::Cancelled)));
        assert_eq!(session.phase().await, Phase::Closed);
        assert!(session.transport().sent().is_empty());
        assert_eq!(session.engine().close_calls(), 1);
        assert_eq!(session.transport().close_calls(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_engine_and_transport() {
        let (transport, _tx) = ScriptedTransport::new();
        let config = config().with_initial_message(false);
        let mut session = Session::new(&config, transport, FakeEngine::new());
        let engine = session.engine().clone();
        let transport = session.transport().clone();

        let result = tokio::time::timeout(Duration::from_millis(100), session.negotiate()).await;
        assert!(result.is_err());
        assert_eq!(session.phase().await, Phase::AwaitingAnswer);
        drop(session);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(engine.close_calls(), 1);
        assert_eq!(transport.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_drop_after_close_does_not_close_again() {
        let (transport, _tx) = ScriptedTransport::new();
        let session = Session::new(&config(), transport, FakeEngine::new());
        let engine = session.engine().clone();

        session.close().await.unwrap();
        drop(session);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(engine.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_close_before_negotiation() {
        let (transport, _tx) = ScriptedTransport::new();
        let session = Session::new(&config(), transport, FakeEngine::new());

        session.close().await.unwrap();
        assert!(session.is_closed().await);
        assert_eq!(session.phase().await, Phase::Closed);
        assert_eq!(session.transport().close_calls(), 1);
    }
}
