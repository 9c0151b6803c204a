//! In-memory transport and engine used by the coordinator and session tests.

use crate::engine::{ConnectivityState, DataChannelKind, PeerEngine, SessionDescription};
use crate::error::{NethernetError, Result};
use crate::protocol::IceCandidate;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub(crate) const FAKE_OFFER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=group:BUNDLE 0\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\nc=IN IP4 0.0.0.0\r\na=mid:0\r\na=sctp-port:5000\r\n";

pub(crate) fn fake_answer() -> String {
    FAKE_OFFER.replace("o=- 1 2", "o=- 7 2")
}

pub(crate) fn answer_line(session_id: &str) -> String {
    format!("CONNECTRESPONSE {} {}", session_id, fake_answer())
}

pub(crate) fn host_candidate_line(address: &str, port: u16) -> String {
    format!("CANDIDATEADD 0 1 1 udp 2130706431 {} {} typ host", address, port)
}

/// Transport fed line by line through an unbounded channel.
///
/// Dropping the sender makes `recv_line` report `ConnectionClosed` once the
/// queued lines are drained.
pub(crate) struct ScriptedTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    sent: Mutex<Vec<String>>,
    closed: CancellationToken,
    close_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            inbound: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closed: CancellationToken::new(),
            close_calls: AtomicUsize::new(0),
        };
        (transport, tx)
    }

    pub(crate) fn shared() -> (Arc<Self>, mpsc::UnboundedSender<String>) {
        let (transport, tx) = Self::new();
        (Arc::new(transport), tx)
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl crate::signaling::SignalingTransport for ScriptedTransport {
    async fn send_line(&self, line: &str) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(NethernetError::Send("transport closed".to_string()));
        }
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    async fn recv_line(&self) -> Result<String> {
        let mut inbound = tokio::select! {
            _ = self.closed.cancelled() => return Err(NethernetError::ConnectionClosed),
            inbound = self.inbound.lock() => inbound,
        };
        tokio::select! {
            _ = self.closed.cancelled() => Err(NethernetError::ConnectionClosed),
            line = inbound.recv() => line.ok_or(NethernetError::ConnectionClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
        Ok(())
    }
}

/// Engine that records what the coordinator asks of it.
pub(crate) struct FakeEngine {
    candidate_tx: mpsc::Sender<IceCandidate>,
    candidate_rx: Mutex<Option<mpsc::Receiver<IceCandidate>>>,
    state_tx: watch::Sender<ConnectivityState>,
    channels: Mutex<Vec<DataChannelKind>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    applied: Mutex<Vec<IceCandidate>>,
    rejected_address: Option<String>,
    reject_answer: bool,
    report_after: Option<(usize, ConnectivityState)>,
    close_calls: AtomicUsize,
}

impl FakeEngine {
    pub(crate) fn new() -> Self {
        let (candidate_tx, candidate_rx) = mpsc::channel(16);
        let (state_tx, _) = watch::channel(ConnectivityState::New);
        Self {
            candidate_tx,
            candidate_rx: Mutex::new(Some(candidate_rx)),
            state_tx,
            channels: Mutex::new(Vec::new()),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            applied: Mutex::new(Vec::new()),
            rejected_address: None,
            reject_answer: false,
            report_after: None,
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Moves to `state` once `count` remote candidates have been applied.
    pub(crate) fn report_after(mut self, count: usize, state: ConnectivityState) -> Self {
        self.report_after = Some((count, state));
        self
    }

    pub(crate) fn rejecting_address(mut self, address: &str) -> Self {
        self.rejected_address = Some(address.to_string());
        self
    }

    pub(crate) fn rejecting_answer(mut self) -> Self {
        self.reject_answer = true;
        self
    }

    /// Simulates local candidate discovery.
    pub(crate) async fn discover(&self, candidate: IceCandidate) {
        self.candidate_tx.send(candidate).await.unwrap();
    }

    pub(crate) fn channels(&self) -> Vec<DataChannelKind> {
        self.channels.lock().unwrap().clone()
    }

    pub(crate) fn remote(&self) -> Option<SessionDescription> {
        self.remote.lock().unwrap().clone()
    }

    pub(crate) fn applied(&self) -> Vec<IceCandidate> {
        self.applied.lock().unwrap().clone()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl PeerEngine for FakeEngine {
    async fn create_offer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::offer(FAKE_OFFER))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::answer(fake_answer()))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        *self.local.lock().unwrap() = Some(description);
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if self.reject_answer {
            return Err(NethernetError::InvalidState("answer refused".to_string()));
        }
        if self.local.lock().unwrap().is_none() {
            return Err(NethernetError::InvalidState("no local description".to_string()));
        }
        *self.remote.lock().unwrap() = Some(description);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if self.remote.lock().unwrap().is_none() {
            return Err(NethernetError::InvalidState("no remote description".to_string()));
        }
        if self.rejected_address.as_deref() == Some(candidate.address.as_str()) {
            return Err(NethernetError::InvalidState("unreachable candidate".to_string()));
        }
        let count = {
            let mut applied = self.applied.lock().unwrap();
            applied.push(candidate);
            applied.len()
        };
        if let Some((after, state)) = self.report_after {
            if count == after {
                self.state_tx.send_replace(state);
            }
        }
        Ok(())
    }

    fn local_candidates(&self) -> Result<mpsc::Receiver<IceCandidate>> {
        self.candidate_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| NethernetError::InvalidState("already subscribed".to_string()))
    }

    async fn create_data_channel(&self, kind: DataChannelKind) -> Result<()> {
        self.channels.lock().unwrap().push(kind);
        Ok(())
    }

    fn connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
