//! Capability surface of the peer-connection engine.
//!
//! The negotiation coordinator only talks to [`PeerEngine`]; ICE, DTLS and
//! SCTP live behind it. [`RtcEngine`] binds it to the `webrtc` crate.

use crate::error::Result;
use crate::protocol::IceCandidate;
use crate::protocol::constants::{RELIABLE_CHANNEL, UNRELIABLE_CHANNEL};
use std::future::Future;
use tokio::sync::{mpsc, watch};

pub mod rtc;

pub use rtc::RtcEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// Session description exchanged during negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Connectivity as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// The two outbound data channels of a NetherNet connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelKind {
    /// Ordered, fully retransmitted
    Reliable,
    /// Unordered, no retransmits
    Unreliable,
}

impl DataChannelKind {
    pub fn label(&self) -> &'static str {
        match self {
            DataChannelKind::Reliable => RELIABLE_CHANNEL,
            DataChannelKind::Unreliable => UNRELIABLE_CHANNEL,
        }
    }
}

/// Operations the coordinator needs from a WebRTC peer connection.
pub trait PeerEngine: Send + Sync {
    fn create_offer(&self) -> impl Future<Output = Result<SessionDescription>> + Send;

    fn create_answer(&self) -> impl Future<Output = Result<SessionDescription>> + Send;

    fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> impl Future<Output = Result<()>> + Send;

    fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Feeds one remote candidate to ICE.
    fn add_ice_candidate(&self, candidate: IceCandidate) -> impl Future<Output = Result<()>> + Send;

    /// Takes the notification channel of locally discovered candidates.
    ///
    /// There is a single subscriber; a second call fails with `InvalidState`.
    fn local_candidates(&self) -> Result<mpsc::Receiver<IceCandidate>>;

    fn create_data_channel(&self, kind: DataChannelKind) -> impl Future<Output = Result<()>> + Send;

    /// Watches the engine's connectivity state.
    fn connectivity(&self) -> watch::Receiver<ConnectivityState>;

    /// Releases the peer connection. Calling it again is a no-op.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
