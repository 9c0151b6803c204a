//! Tokio-based NetherNet signaling client.
//!
//! Establishes a WebRTC connection to a NetherNet peer by exchanging SDP and
//! ICE candidates over the franchise signaling WebSocket:
//! - [`Session`] composes transport, negotiation and engine
//! - [`WebSocketSignaling`] for the `CONNECTREQUEST`/`CONNECTRESPONSE`/`CANDIDATEADD` channel
//! - [`Coordinator`] for the offer/answer state machine
//! - [`RtcEngine`] binding [`PeerEngine`] to the `webrtc` crate
//! - [`IceCandidate`] text codec
//!
//! ## Features
//!
//! - Line-oriented and JSON signaling envelopes
//! - Bidirectional trickle ICE with buffering around the answer
//! - Reliable and unreliable data channels
//! - Bounded answer and connectivity waits with `CONNECTERROR` reporting
//! - Cancellation of every pending wait

pub mod config;
pub mod engine;
pub mod error;
pub mod negotiation;
pub mod protocol;
pub mod session;
pub mod signaling;

pub use config::SessionConfig;
pub use engine::{ConnectivityState, DataChannelKind, PeerEngine, RtcEngine, SessionDescription};
pub use error::{NethernetError, ParseError, Result};
pub use negotiation::{Coordinator, NegotiationConfig, NegotiationSession, Phase};
pub use protocol::{CandidateType, ErrorCode, IceCandidate, Signal, SignalType};
pub use session::Session;
pub use signaling::{Credentials, SignalingTransport, WebSocketSignaling};
