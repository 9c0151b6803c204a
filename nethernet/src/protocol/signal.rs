//! Signaling envelope.
//!
//! One message per WebSocket text frame: `VERB <id> <payload>`, where the
//! payload is the untouched remainder of the line. The signaling service may
//! also answer with a JSON object carrying the same information.

use super::ErrorCode;
use crate::error::ParseError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Signal verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// CONNECTREQUEST - SDP offer from the client
    ConnectRequest,
    /// CONNECTRESPONSE - SDP answer from the server
    ConnectResponse,
    /// CANDIDATEADD - ICE candidate, either direction
    CandidateAdd,
    /// CONNECTERROR - negotiation aborted with an error code
    ConnectError,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::ConnectRequest => "CONNECTREQUEST",
            SignalType::ConnectResponse => "CONNECTRESPONSE",
            SignalType::CandidateAdd => "CANDIDATEADD",
            SignalType::ConnectError => "CONNECTERROR",
        }
    }
}

impl FromStr for SignalType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECTREQUEST" => Ok(SignalType::ConnectRequest),
            "CONNECTRESPONSE" => Ok(SignalType::ConnectResponse),
            "CANDIDATEADD" => Ok(SignalType::CandidateAdd),
            "CONNECTERROR" => Ok(SignalType::ConnectError),
            _ => Err(ParseError::UnknownSignalType(s.to_string())),
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed signaling message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    ConnectRequest {
        session_id: String,
        sdp: String,
    },
    /// `tag` is the session id, or the description type in the `<type> <sdp>` variant.
    ConnectResponse {
        tag: String,
        sdp: String,
    },
    CandidateAdd {
        media_id: String,
        candidate: String,
    },
    ConnectError {
        session_id: String,
        error: ErrorCode,
    },
}

/// JSON form of a signaling message.
#[derive(Debug, Deserialize)]
struct JsonEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    sdp: Option<String>,
    candidate: Option<String>,
    #[serde(rename = "sdpMid")]
    sdp_mid: Option<String>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    code: Option<u32>,
}

/// Splits off the first whitespace-delimited token; the rest is returned with
/// leading whitespace removed and otherwise untouched.
fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], s[end..].trim_start())),
        None => Some((s, "")),
    }
}

fn required<'a>(value: Option<&'a str>, what: &'static str) -> Result<&'a str, ParseError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ParseError::MissingField(what)),
    }
}

fn parse_error_code(raw: &str) -> Result<ErrorCode, ParseError> {
    let code = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidErrorCode(raw.to_string()))?;
    Ok(ErrorCode::from_code(code).unwrap_or(ErrorCode::SignalingUnknownError))
}

impl Signal {
    /// Parses one signaling frame.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        if line.trim_start().starts_with('{') {
            return Self::parse_json(line);
        }

        let (verb, rest) = split_token(line).ok_or(ParseError::EmptyMessage)?;
        let signal_type = SignalType::from_str(verb)?;
        let (id, payload) = split_token(rest).unwrap_or(("", ""));

        match signal_type {
            SignalType::ConnectRequest => Ok(Self::ConnectRequest {
                session_id: required(Some(id), "missing session ID")?.to_string(),
                sdp: required(Some(payload), "missing SDP offer")?.to_string(),
            }),
            SignalType::ConnectResponse => Ok(Self::ConnectResponse {
                tag: required(Some(id), "missing session ID")?.to_string(),
                sdp: required(Some(payload), "missing SDP answer")?.to_string(),
            }),
            SignalType::CandidateAdd => Ok(Self::CandidateAdd {
                media_id: required(Some(id), "missing media ID")?.to_string(),
                candidate: required(Some(payload), "missing ICE candidate")?.to_string(),
            }),
            SignalType::ConnectError => Ok(Self::ConnectError {
                session_id: required(Some(id), "missing session ID")?.to_string(),
                error: parse_error_code(required(Some(payload), "missing error code")?)?,
            }),
        }
    }

    fn parse_json(text: &str) -> Result<Self, ParseError> {
        let envelope: JsonEnvelope =
            serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;

        let kind = envelope.kind.as_deref();
        let signal_type = match kind {
            Some(k) if k.eq_ignore_ascii_case("offer") => SignalType::ConnectRequest,
            Some(k) if k.eq_ignore_ascii_case("answer") => SignalType::ConnectResponse,
            Some(k) => SignalType::from_str(k)?,
            None if envelope.candidate.is_some() => SignalType::CandidateAdd,
            None => return Err(ParseError::MissingField("missing message type")),
        };

        match signal_type {
            SignalType::ConnectRequest => Ok(Self::ConnectRequest {
                session_id: required(envelope.session_id.as_deref(), "missing session ID")?
                    .to_string(),
                sdp: required(envelope.sdp.as_deref(), "missing SDP offer")?.to_string(),
            }),
            SignalType::ConnectResponse => Ok(Self::ConnectResponse {
                tag: envelope
                    .session_id
                    .or(envelope.kind)
                    .unwrap_or_else(|| "answer".to_string()),
                sdp: required(envelope.sdp.as_deref(), "missing SDP answer")?.to_string(),
            }),
            SignalType::CandidateAdd => Ok(Self::CandidateAdd {
                media_id: envelope.sdp_mid.unwrap_or_else(|| "0".to_string()),
                candidate: required(envelope.candidate.as_deref(), "missing ICE candidate")?
                    .to_string(),
            }),
            SignalType::ConnectError => Ok(Self::ConnectError {
                session_id: envelope.session_id.unwrap_or_default(),
                error: envelope
                    .code
                    .map(|c| ErrorCode::from_code(c).unwrap_or(ErrorCode::SignalingUnknownError))
                    .ok_or(ParseError::MissingField("missing error code"))?,
            }),
        }
    }

    pub fn signal_type(&self) -> SignalType {
        match self {
            Self::ConnectRequest { .. } => SignalType::ConnectRequest,
            Self::ConnectResponse { .. } => SignalType::ConnectResponse,
            Self::CandidateAdd { .. } => SignalType::CandidateAdd,
            Self::ConnectError { .. } => SignalType::ConnectError,
        }
    }
}

impl FromStr for Signal {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.signal_type();
        match self {
            Self::ConnectRequest { session_id, sdp } => write!(f, "{} {} {}", verb, session_id, sdp),
            Self::ConnectResponse { tag, sdp } => write!(f, "{} {} {}", verb, tag, sdp),
            Self::CandidateAdd {
                media_id,
                candidate,
            } => write!(f, "{} {} {}", verb, media_id, candidate),
            Self::ConnectError { session_id, error } => {
                write!(f, "{} {} {}", verb, session_id, error.code())
            }
        }
    }
}
