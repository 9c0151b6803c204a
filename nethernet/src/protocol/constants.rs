//! Constants for the NetherNet signaling protocol.

use std::time::Duration;

/// Signaling endpoint; `{session_id}` is replaced with the session identifier.
pub const DEFAULT_SIGNALING_URL: &str =
    "wss://signal.franchise.minecraft-services.net/ws/v1.0/signaling/{session_id}";

/// Placeholder substituted in the endpoint template.
pub const SESSION_ID_PLACEHOLDER: &str = "{session_id}";

/// Default STUN server handed to the WebRTC engine.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

pub const RELIABLE_CHANNEL: &str = "ReliableDataChannel";
pub const UNRELIABLE_CHANNEL: &str = "UnreliableDataChannel";

/// Media id used for outbound candidates when the engine does not report one.
pub const DEFAULT_MEDIA_ID: &str = "0";

/// Time allowed for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed between sending CONNECTREQUEST and receiving CONNECTRESPONSE.
pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the engine to report connectivity once the answer is applied.
pub const DEFAULT_ICE_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the local candidate notification channel.
pub const DEFAULT_CANDIDATE_CHANNEL_CAPACITY: usize = 64;
