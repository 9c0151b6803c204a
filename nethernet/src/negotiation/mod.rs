//! Offer/answer and candidate exchange over a signaling transport.
//!
//! The [`Coordinator`] drives one attempt through
//! `Idle → OfferSent → AwaitingAnswer → AnswerApplied → CandidateExchange → Connected`.
//! `Failed` and `Closed` are terminal and reachable from every phase.

use crate::engine::{ConnectivityState, DataChannelKind, PeerEngine, SessionDescription};
use crate::error::{NethernetError, Result};
use crate::protocol::constants::{DEFAULT_ANSWER_TIMEOUT, DEFAULT_ICE_TIMEOUT, DEFAULT_MEDIA_ID};
use crate::protocol::{ErrorCode, IceCandidate, Signal, sdp};
use crate::signaling::SignalingTransport;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
pub(crate) mod testing;

/// Negotiation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    OfferSent,
    AwaitingAnswer,
    AnswerApplied,
    CandidateExchange,
    Connected,
    Failed,
    Closed,
}

impl Phase {
    /// `Failed` or `Closed`
    pub fn is_finished(&self) -> bool {
        matches!(self, Phase::Failed | Phase::Closed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationConfig {
    /// Bound on the wait for `CONNECTRESPONSE`
    pub answer_timeout: Duration,
    /// Bound on the candidate exchange until the engine reports connectivity
    pub ice_timeout: Duration,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            answer_timeout: DEFAULT_ANSWER_TIMEOUT,
            ice_timeout: DEFAULT_ICE_TIMEOUT,
        }
    }
}

/// State of one negotiation attempt.
#[derive(Debug, Clone)]
pub struct NegotiationSession {
    pub session_id: String,
    pub local_description: Option<SessionDescription>,
    pub remote_description: Option<SessionDescription>,
    /// Local candidates discovered before the answer was applied, in discovery order
    pub pending_local_candidates: VecDeque<IceCandidate>,
    /// Remote candidates received before the answer was applied
    pub pending_remote_candidates: VecDeque<IceCandidate>,
    /// Well-formed remote candidates received so far
    pub received_remote_candidate_count: usize,
    pub phase: Phase,
}

impl NegotiationSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            local_description: None,
            remote_description: None,
            pending_local_candidates: VecDeque::new(),
            pending_remote_candidates: VecDeque::new(),
            received_remote_candidate_count: 0,
            phase: Phase::Idle,
        }
    }
}

/// Wakeups while waiting for the answer.
enum AnswerEvent {
    Inbound(Result<String>),
    Local(Option<IceCandidate>),
}

/// Wakeups during the candidate exchange.
enum ExchangeEvent {
    Inbound(Result<String>),
    Local(Option<IceCandidate>),
    /// `false` once the engine stopped publishing connectivity
    Connectivity(bool),
}

async fn next_local(rx: &mut Option<mpsc::Receiver<IceCandidate>>) -> Option<IceCandidate> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn connectivity_outcome(state: ConnectivityState) -> Option<Result<()>> {
    match state {
        ConnectivityState::Connected => Some(Ok(())),
        ConnectivityState::Failed => Some(Err(NethernetError::Negotiation(
            "ICE connectivity failed".to_string(),
        ))),
        ConnectivityState::Closed => Some(Err(NethernetError::ConnectionClosed)),
        _ => None,
    }
}

/// Drives one negotiation attempt for a session.
pub struct Coordinator<T, E> {
    transport: Arc<T>,
    engine: Arc<E>,
    config: NegotiationConfig,
    cancel: CancellationToken,
    session: NegotiationSession,
    local_candidates: Option<mpsc::Receiver<IceCandidate>>,
}

impl<T: SignalingTransport, E: PeerEngine> Coordinator<T, E> {
    pub fn new(
        session_id: impl Into<String>,
        transport: Arc<T>,
        engine: Arc<E>,
        config: NegotiationConfig,
    ) -> Self {
        Self {
            transport,
            engine,
            config,
            cancel: CancellationToken::new(),
            session: NegotiationSession::new(session_id),
            local_candidates: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts [`Coordinator::run`] when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &NegotiationSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Runs the attempt from its current phase until `Connected`.
    ///
    /// On error the phase becomes `Closed` for closure or cancellation and
    /// `Failed` otherwise, and both engine and transport are released.
    pub async fn run(&mut self) -> Result<()> {
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NethernetError::Cancelled),
            result = self.negotiate() => result,
        };

        if let Err(e) = &result {
            self.abort(e).await;
        }
        result
    }

    /// Ends the attempt after `error` and releases engine and transport.
    pub async fn abort(&mut self, error: &NethernetError) {
        let phase = if error.is_closure() { Phase::Closed } else { Phase::Failed };
        tracing::warn!(session_id = %self.session.session_id, "negotiation ended: {}", error);
        self.transition(phase);
        self.shutdown().await;
    }

    async fn negotiate(&mut self) -> Result<()> {
        loop {
            match self.session.phase {
                Phase::Idle => self.send_offer().await?,
                Phase::AwaitingAnswer => self.await_answer().await?,
                Phase::AnswerApplied => self.exchange_candidates().await?,
                Phase::Connected => return Ok(()),
                phase => {
                    return Err(NethernetError::InvalidState(format!(
                        "cannot negotiate from {phase}"
                    )));
                }
            }
        }
    }

    /// Creates both data channels and the offer, then sends `CONNECTREQUEST`.
    pub async fn send_offer(&mut self) -> Result<()> {
        self.expect_phase(Phase::Idle, "send offer")?;

        self.engine.create_data_channel(DataChannelKind::Reliable).await?;
        self.engine.create_data_channel(DataChannelKind::Unreliable).await?;
        self.local_candidates = Some(self.engine.local_candidates()?);

        let offer = self.engine.create_offer().await?;
        self.engine.set_local_description(offer.clone()).await?;

        let request = Signal::ConnectRequest {
            session_id: self.session.session_id.clone(),
            sdp: offer.sdp.clone(),
        };
        self.session.local_description = Some(offer);
        self.send(&request).await?;

        self.transition(Phase::OfferSent);
        self.transition(Phase::AwaitingAnswer);
        Ok(())
    }

    /// Waits for `CONNECTRESPONSE`, vets it against the offer and applies it.
    ///
    /// Remote candidates that arrive first are applied right after the answer.
    pub async fn await_answer(&mut self) -> Result<()> {
        self.expect_phase(Phase::AwaitingAnswer, "await answer")?;

        let answer = match tokio::time::timeout(self.config.answer_timeout, self.receive_answer()).await {
            Ok(answer) => answer?,
            Err(_) => {
                self.report_error(ErrorCode::NegotiationTimeoutWaitingForResponse)
                    .await;
                return Err(NethernetError::Timeout);
            }
        };

        self.apply_answer(answer).await?;

        while let Some(candidate) = self.session.pending_remote_candidates.pop_front() {
            self.apply_remote(candidate).await;
        }
        Ok(())
    }

    /// Exchanges candidates in both directions until the engine reports
    /// connectivity.
    pub async fn exchange_candidates(&mut self) -> Result<()> {
        self.expect_phase(Phase::AnswerApplied, "exchange candidates")?;
        self.transition(Phase::CandidateExchange);

        while let Some(candidate) = self.session.pending_local_candidates.pop_front() {
            self.send_candidate(&candidate).await?;
        }

        match tokio::time::timeout(self.config.ice_timeout, self.exchange_loop()).await {
            Ok(result) => result?,
            Err(_) => {
                self.report_error(ErrorCode::NegotiationTimeout).await;
                return Err(NethernetError::Timeout);
            }
        }

        self.transition(Phase::Connected);
        Ok(())
    }

    async fn receive_answer(&mut self) -> Result<String> {
        loop {
            let event = tokio::select! {
                biased;
                candidate = next_local(&mut self.local_candidates) => AnswerEvent::Local(candidate),
                line = self.transport.recv_line() => AnswerEvent::Inbound(line),
            };

            match event {
                AnswerEvent::Local(Some(candidate)) => {
                    tracing::debug!(address = %candidate.address, "queueing local candidate until answer");
                    self.session.pending_local_candidates.push_back(candidate);
                }
                AnswerEvent::Local(None) => self.local_candidates = None,
                AnswerEvent::Inbound(line) => match Signal::parse(&line?)? {
                    Signal::ConnectResponse { tag, sdp } => {
                        if tag != self.session.session_id {
                            tracing::debug!(%tag, "answer tagged with another id");
                        }
                        return Ok(sdp);
                    }
                    Signal::CandidateAdd {
                        media_id,
                        candidate,
                    } => {
                        if let Some(candidate) = self.inbound_candidate(&media_id, &candidate) {
                            self.session.pending_remote_candidates.push_back(candidate);
                        }
                    }
                    Signal::ConnectError { error, .. } => return Err(NethernetError::Remote(error)),
                    Signal::ConnectRequest { .. } => {
                        tracing::warn!("ignoring CONNECTREQUEST while awaiting answer");
                    }
                },
            }
        }
    }

    async fn apply_answer(&mut self, sdp: String) -> Result<()> {
        let offer = self
            .session
            .local_description
            .as_ref()
            .map(|d| d.sdp.as_str())
            .unwrap_or_default();

        if let Err(reason) = sdp::check_answer(offer, &sdp) {
            self.report_error(ErrorCode::FailedToSetRemoteDescription).await;
            return Err(NethernetError::Negotiation(reason));
        }

        let answer = SessionDescription::answer(sdp);
        if let Err(e) = self.engine.set_remote_description(answer.clone()).await {
            self.report_error(ErrorCode::FailedToSetRemoteDescription).await;
            return Err(NethernetError::Negotiation(format!("answer rejected: {e}")));
        }

        self.session.remote_description = Some(answer);
        self.transition(Phase::AnswerApplied);
        Ok(())
    }

    async fn exchange_loop(&mut self) -> Result<()> {
        let mut connectivity = self.engine.connectivity();
        loop {
            let state = *connectivity.borrow_and_update();
            if let Some(outcome) = connectivity_outcome(state) {
                return outcome;
            }

            let event = tokio::select! {
                biased;
                candidate = next_local(&mut self.local_candidates) => ExchangeEvent::Local(candidate),
                line = self.transport.recv_line() => ExchangeEvent::Inbound(line),
                changed = connectivity.changed() => ExchangeEvent::Connectivity(changed.is_ok()),
            };

            match event {
                ExchangeEvent::Local(Some(candidate)) => self.send_candidate(&candidate).await?,
                ExchangeEvent::Local(None) => {
                    tracing::debug!("local candidate stream ended");
                    self.local_candidates = None;
                }
                ExchangeEvent::Inbound(line) => match Signal::parse(&line?)? {
                    Signal::CandidateAdd {
                        media_id,
                        candidate,
                    } => {
                        if let Some(candidate) = self.inbound_candidate(&media_id, &candidate) {
                            self.apply_remote(candidate).await;
                        }
                    }
                    Signal::ConnectError { error, .. } => return Err(NethernetError::Remote(error)),
                    other => {
                        tracing::warn!(signal = %other.signal_type(), "ignoring signal during candidate exchange");
                    }
                },
                ExchangeEvent::Connectivity(true) => {}
                ExchangeEvent::Connectivity(false) => {
                    return Err(NethernetError::Negotiation(
                        "engine stopped reporting connectivity".to_string(),
                    ));
                }
            }
        }
    }

    fn inbound_candidate(&mut self, media_id: &str, text: &str) -> Option<IceCandidate> {
        match IceCandidate::parse(text) {
            Ok(candidate) => {
                self.session.received_remote_candidate_count += 1;
                Some(candidate.with_sdp_mid(media_id))
            }
            Err(e) => {
                tracing::warn!("dropping malformed remote candidate {:?}: {}", text, e);
                None
            }
        }
    }

    async fn apply_remote(&self, candidate: IceCandidate) {
        let address = candidate.address.clone();
        match self.engine.add_ice_candidate(candidate).await {
            Ok(()) => tracing::debug!(%address, "applied remote candidate"),
            Err(e) => tracing::warn!(%address, "engine rejected remote candidate: {}", e),
        }
    }

    async fn send_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        let signal = Signal::CandidateAdd {
            media_id: candidate
                .sdp_mid
                .clone()
                .unwrap_or_else(|| DEFAULT_MEDIA_ID.to_string()),
            candidate: candidate.serialize(),
        };
        self.send(&signal).await
    }

    async fn send(&self, signal: &Signal) -> Result<()> {
        tracing::debug!(signal = %signal.signal_type(), "sending");
        self.transport.send_line(&signal.to_string()).await
    }

    /// Best-effort `CONNECTERROR`; a failure to send is only logged.
    async fn report_error(&self, error: ErrorCode) {
        let signal = Signal::ConnectError {
            session_id: self.session.session_id.clone(),
            error,
        };
        if let Err(e) = self.send(&signal).await {
            tracing::debug!("could not report {}: {}", error, e);
        }
    }

    async fn shutdown(&self) {
        if let Err(e) = self.engine.close().await {
            tracing::debug!("engine close failed: {}", e);
        }
        if let Err(e) = self.transport.close().await {
            tracing::debug!("transport close failed: {}", e);
        }
    }

    fn expect_phase(&self, expected: Phase, operation: &str) -> Result<()> {
        if self.session.phase == expected {
            Ok(())
        } else {
            Err(NethernetError::InvalidState(format!(
                "cannot {} in phase {}",
                operation, self.session.phase
            )))
        }
    }

    fn transition(&mut self, phase: Phase) {
        tracing::info!(
            session_id = %self.session.session_id,
            from = %self.session.phase,
            to = %phase,
            "negotiation phase changed"
        );
        self.session.phase = phase;
    }
}
