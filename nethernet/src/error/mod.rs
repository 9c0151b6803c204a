use crate::protocol::ErrorCode;
use thiserror::Error;

/// Errors surfaced by the NetherNet signaling client.
#[derive(Debug, Error)]
pub enum NethernetError {
    /// Error raised by the WebRTC engine
    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    /// Opening the signaling connection failed (handshake rejected, DNS/TLS, timeout)
    #[error("Connect error: {0}")]
    Connect(String),

    /// Writing a frame to the signaling connection failed
    #[error("Send error: {0}")]
    Send(String),

    /// Reading a frame from the signaling connection failed
    #[error("Receive error: {0}")]
    Recv(String),

    /// The signaling connection was closed, locally or by the remote end
    #[error("Connection closed")]
    ConnectionClosed,

    /// Malformed envelope or candidate grammar
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Structurally invalid or incompatible answer, or engine-reported failure
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// The remote peer aborted the negotiation with a CONNECTERROR
    #[error("Remote peer reported error: {0}")]
    Remote(ErrorCode),

    /// Invalid session configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// The attempt was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation not allowed in the current negotiation phase
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl NethernetError {
    /// Whether this error ends the attempt as `Closed` rather than `Failed`.
    pub fn is_closure(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Cancelled)
    }
}

/// Grammar errors for signaling envelopes and ICE candidate strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty signaling message")]
    EmptyMessage,

    #[error("unknown signal type: {0}")]
    UnknownSignalType(String),

    #[error("{0}")]
    MissingField(&'static str),

    #[error("invalid JSON envelope: {0}")]
    Json(String),

    #[error("candidate has {0} tokens, expected at least 8")]
    TooFewTokens(usize),

    #[error("invalid candidate {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("expected `typ` as 7th candidate token, got {0:?}")]
    MissingTyp(String),

    #[error("unknown candidate type: {0}")]
    UnknownCandidateType(String),

    #[error("candidate extension `{0}` has no value")]
    DanglingKey(String),

    #[error("invalid error code: {0}")]
    InvalidErrorCode(String),
}

pub type Result<T> = std::result::Result<T, NethernetError>;
