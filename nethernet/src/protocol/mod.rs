pub mod candidate;
pub mod constants;
pub mod error_code;
pub mod sdp;
pub mod signal;

pub use candidate::{CandidateType, IceCandidate};
pub use error_code::ErrorCode;
pub use signal::{Signal, SignalType};
