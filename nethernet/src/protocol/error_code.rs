//! NetherNet connection error codes.
//!
//! Carried as the decimal payload of `CONNECTERROR` lines.

use std::fmt;

/// Error codes exchanged during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    None = 0,
    DestinationNotLoggedIn = 1,
    NegotiationTimeout = 2,
    WrongTransportVersion = 3,
    FailedToCreatePeerConnection = 4,
    Ice = 5,
    ConnectRequest = 6,
    ConnectResponse = 7,
    CandidateAdd = 8,
    InactivityTimeout = 9,
    FailedToCreateOffer = 10,
    FailedToCreateAnswer = 11,
    FailedToSetLocalDescription = 12,
    FailedToSetRemoteDescription = 13,
    NegotiationTimeoutWaitingForResponse = 14,
    NegotiationTimeoutWaitingForAccept = 15,
    IncomingConnectionIgnored = 16,
    SignalingParsingFailure = 17,
    SignalingUnknownError = 18,
    SignalingUnicastMessageDeliveryFailed = 19,
    // 20 is unassigned
    SignalingBroadcastDeliveryFailed = 21,
    SignalingMessageDeliveryFailed = 22,
    SignalingTurnAuthFailed = 23,
    SignalingFallbackToBestEffortDelivery = 24,
    NoSignalingChannel = 25,
    NotLoggedIn = 26,
    SignalingFailedToSend = 27,
}

impl ErrorCode {
    /// Every known code, in discriminant order.
    const ALL: [ErrorCode; 27] = [
        ErrorCode::None,
        ErrorCode::DestinationNotLoggedIn,
        ErrorCode::NegotiationTimeout,
        ErrorCode::WrongTransportVersion,
        ErrorCode::FailedToCreatePeerConnection,
        ErrorCode::Ice,
        ErrorCode::ConnectRequest,
        ErrorCode::ConnectResponse,
        ErrorCode::CandidateAdd,
        ErrorCode::InactivityTimeout,
        ErrorCode::FailedToCreateOffer,
        ErrorCode::FailedToCreateAnswer,
        ErrorCode::FailedToSetLocalDescription,
        ErrorCode::FailedToSetRemoteDescription,
        ErrorCode::NegotiationTimeoutWaitingForResponse,
        ErrorCode::NegotiationTimeoutWaitingForAccept,
        ErrorCode::IncomingConnectionIgnored,
        ErrorCode::SignalingParsingFailure,
        ErrorCode::SignalingUnknownError,
        ErrorCode::SignalingUnicastMessageDeliveryFailed,
        ErrorCode::SignalingBroadcastDeliveryFailed,
        ErrorCode::SignalingMessageDeliveryFailed,
        ErrorCode::SignalingTurnAuthFailed,
        ErrorCode::SignalingFallbackToBestEffortDelivery,
        ErrorCode::NoSignalingChannel,
        ErrorCode::NotLoggedIn,
        ErrorCode::SignalingFailedToSend,
    ];

    /// Looks up a numeric code; `None` for unassigned codes.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    fn description(&self) -> &'static str {
        match self {
            Self::None => "no error",
            Self::DestinationNotLoggedIn => "destination not logged in",
            Self::NegotiationTimeout => "negotiation timeout",
            Self::WrongTransportVersion => "wrong transport version",
            Self::FailedToCreatePeerConnection => "failed to create peer connection",
            Self::Ice => "ICE error",
            Self::ConnectRequest => "connect request error",
            Self::ConnectResponse => "connect response error",
            Self::CandidateAdd => "candidate add error",
            Self::InactivityTimeout => "inactivity timeout",
            Self::FailedToCreateOffer => "failed to create offer",
            Self::FailedToCreateAnswer => "failed to create answer",
            Self::FailedToSetLocalDescription => "failed to set local description",
            Self::FailedToSetRemoteDescription => "failed to set remote description",
            Self::NegotiationTimeoutWaitingForResponse => "negotiation timeout waiting for response",
            Self::NegotiationTimeoutWaitingForAccept => "negotiation timeout waiting for accept",
            Self::IncomingConnectionIgnored => "incoming connection ignored",
            Self::SignalingParsingFailure => "signaling parsing failure",
            Self::SignalingUnknownError => "signaling unknown error",
            Self::SignalingUnicastMessageDeliveryFailed => "signaling unicast message delivery failed",
            Self::SignalingBroadcastDeliveryFailed => "signaling broadcast delivery failed",
            Self::SignalingMessageDeliveryFailed => "signaling message delivery failed",
            Self::SignalingTurnAuthFailed => "signaling TURN auth failed",
            Self::SignalingFallbackToBestEffortDelivery => "signaling fallback to best effort delivery",
            Self::NoSignalingChannel => "no signaling channel",
            Self::NotLoggedIn => "not logged in",
            Self::SignalingFailedToSend => "signaling failed to send",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}
