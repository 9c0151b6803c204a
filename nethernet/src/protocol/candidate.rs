//! ICE candidate text codec.
//!
//! Candidates travel as the remainder of a `CANDIDATEADD` line:
//! `foundation component protocol priority address port typ type [raddr <addr>] [rport <port>] [tcptype <type>]`

use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

/// Prefix used by browsers and the WebRTC engine in front of the foundation.
const CANDIDATE_PREFIX: &str = "candidate:";

/// Number of fixed-position tokens every candidate carries.
const FIXED_TOKENS: usize = 8;

/// ICE candidate types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateType {
    /// host - address of a local interface
    Host,
    /// srflx - server reflexive, learned through STUN
    ServerReflexive,
    /// prflx - peer reflexive, learned during connectivity checks
    PeerReflexive,
    /// relay - allocated on a TURN server
    Relay,
}

impl CandidateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateType::Host => "host",
            CandidateType::ServerReflexive => "srflx",
            CandidateType::PeerReflexive => "prflx",
            CandidateType::Relay => "relay",
        }
    }
}

impl FromStr for CandidateType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            CandidateType::Host,
            CandidateType::ServerReflexive,
            CandidateType::PeerReflexive,
            CandidateType::Relay,
        ]
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| ParseError::UnknownCandidateType(s.to_string()))
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured ICE candidate.
///
/// `sdp_mid` and `sdp_mline_index` are never part of the candidate text; they
/// travel in the signaling envelope and are attached by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub foundation: String,
    pub component: u16,
    /// Transport protocol as received; compare with [`IceCandidate::is_udp`] / [`IceCandidate::is_tcp`].
    pub protocol: String,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    pub candidate_type: CandidateType,
    pub related_address: Option<String>,
    pub related_port: Option<u16>,
    pub tcp_type: Option<String>,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    /// Creates a candidate from its fixed-position fields; all optional fields are unset.
    pub fn new(
        foundation: impl Into<String>,
        component: u16,
        protocol: impl Into<String>,
        priority: u32,
        address: impl Into<String>,
        port: u16,
        candidate_type: CandidateType,
    ) -> Self {
        Self {
            foundation: foundation.into(),
            component,
            protocol: protocol.into(),
            priority,
            address: address.into(),
            port,
            candidate_type,
            related_address: None,
            related_port: None,
            tcp_type: None,
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }

    /// Parses candidate text.
    ///
    /// An optional `candidate:` prefix on the foundation is stripped. Unknown
    /// extension pairs are skipped, but a trailing key without a value is an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use nethernet::protocol::{CandidateType, IceCandidate};
    ///
    /// let c = IceCandidate::parse("foundation 1 UDP 2122260223 192.168.1.2 12345 typ host").unwrap();
    /// assert_eq!(c.port, 12345);
    /// assert_eq!(c.candidate_type, CandidateType::Host);
    /// assert!(c.related_address.is_none());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() < FIXED_TOKENS {
            return Err(ParseError::TooFewTokens(tokens.len()));
        }

        let foundation = tokens[0].strip_prefix(CANDIDATE_PREFIX).unwrap_or(tokens[0]);
        if foundation.is_empty() {
            return Err(invalid("foundation", tokens[0]));
        }
        let component = tokens[1]
            .parse::<u16>()
            .map_err(|_| invalid("component", tokens[1]))?;
        let protocol = tokens[2];
        if !protocol.eq_ignore_ascii_case("udp") && !protocol.eq_ignore_ascii_case("tcp") {
            return Err(invalid("protocol", protocol));
        }
        let priority = tokens[3]
            .parse::<u32>()
            .map_err(|_| invalid("priority", tokens[3]))?;
        let port = tokens[5]
            .parse::<u16>()
            .map_err(|_| invalid("port", tokens[5]))?;
        if tokens[6] != "typ" {
            return Err(ParseError::MissingTyp(tokens[6].to_string()));
        }
        let candidate_type = tokens[7].parse::<CandidateType>()?;

        let mut candidate = Self::new(
            foundation,
            component,
            protocol,
            priority,
            tokens[4],
            port,
            candidate_type,
        );

        let mut extensions = tokens[FIXED_TOKENS..].iter();
        while let Some(&key) = extensions.next() {
            let Some(&value) = extensions.next() else {
                return Err(ParseError::DanglingKey(key.to_string()));
            };
            match key {
                "raddr" => candidate.related_address = Some(value.to_string()),
                "rport" => {
                    candidate.related_port =
                        Some(value.parse::<u16>().map_err(|_| invalid("rport", value))?)
                }
                "tcptype" => candidate.tcp_type = Some(value.to_string()),
                // generation, ufrag, network-id, network-cost, ...
                _ => {}
            }
        }

        Ok(candidate)
    }

    /// Serializes the candidate text without the `candidate:` prefix.
    ///
    /// Optional pairs are emitted in the fixed order `raddr`, `rport`, `tcptype`.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Attaches the media stream identification carried by the envelope.
    pub fn with_sdp_mid(mut self, sdp_mid: impl Into<String>) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self
    }

    pub fn is_udp(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("udp")
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("tcp")
    }
}

fn invalid(field: &'static str, value: &str) -> ParseError {
    ParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

impl FromStr for IceCandidate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.protocol,
            self.priority,
            self.address,
            self.port,
            self.candidate_type
        )?;
        if let Some(addr) = &self.related_address {
            write!(f, " raddr {}", addr)?;
        }
        if let Some(port) = self.related_port {
            write!(f, " rport {}", port)?;
        }
        if let Some(tcp_type) = &self.tcp_type {
            write!(f, " tcptype {}", tcp_type)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "foundation 1 UDP 2122260223 192.168.1.2 12345 typ host";

    #[test]
    fn test_parse_host_candidate() {
        let c = IceCandidate::parse(HOST).unwrap();
        assert_eq!(c.foundation, "foundation");
        assert_eq!(c.component, 1);
        assert_eq!(c.protocol, "UDP");
        assert_eq!(c.priority, 2122260223);
        assert_eq!(c.address, "192.168.1.2");
        assert_eq!(c.port, 12345);
        assert_eq!(c.candidate_type, CandidateType::Host);
        assert_eq!(c.related_address, None);
        assert_eq!(c.related_port, None);
        assert_eq!(c.tcp_type, None);
        assert_eq!(c.sdp_mid, None);
        assert_eq!(c.sdp_mline_index, None);
        assert!(c.is_udp());
        assert!(!c.is_tcp());
    }

    #[test]
    fn test_parse_optional_fields() {
        let c = IceCandidate::parse(
            "842163049 1 tcp 1677729535 203.0.113.7 9 typ srflx raddr 10.0.0.1 rport 4000 tcptype passive",
        )
        .unwrap();
        assert_eq!(c.candidate_type, CandidateType::ServerReflexive);
        assert_eq!(c.related_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(c.related_port, Some(4000));
        assert_eq!(c.tcp_type.as_deref(), Some("passive"));
        assert_eq!(c.sdp_mid, None);
        assert_eq!(c.sdp_mline_index, None);
    }

    #[test]
    fn test_protocol_is_udp_or_tcp() {
        let c = IceCandidate::parse("f 1 Tcp 1 10.0.0.1 5000 typ host").unwrap();
        assert_eq!(c.protocol, "Tcp");
        assert!(c.is_tcp());

        assert_eq!(
            IceCandidate::parse("f 1 sctp 1 10.0.0.1 5000 typ host"),
            Err(ParseError::InvalidField {
                field: "protocol",
                value: "sctp".to_string(),
            })
        );
    }

    #[test]
    fn test_too_few_tokens() {
        assert_eq!(
            IceCandidate::parse("foundation 1 UDP 2122260223 192.168.1.2 12345 typ"),
            Err(ParseError::TooFewTokens(7))
        );
        assert_eq!(IceCandidate::parse(""), Err(ParseError::TooFewTokens(0)));
    }

    #[test]
    fn test_non_integer_fields() {
        for (text, field) in [
            ("f one UDP 2122260223 192.168.1.2 12345 typ host", "component"),
            ("f 1 UDP high 192.168.1.2 12345 typ host", "priority"),
            ("f 1 UDP -5 192.168.1.2 12345 typ host", "priority"),
            ("f 1 UDP 2122260223 192.168.1.2 port typ host", "port"),
            ("f 1 UDP 2122260223 192.168.1.2 70000 typ host", "port"),
        ] {
            match IceCandidate::parse(text) {
                Err(ParseError::InvalidField { field: f, .. }) => assert_eq!(f, field, "{text}"),
                other => panic!("unexpected result for {text:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_typ_literal() {
        assert_eq!(
            IceCandidate::parse("f 1 UDP 2122260223 192.168.1.2 12345 type host"),
            Err(ParseError::MissingTyp("type".to_string()))
        );
    }

    #[test]
    fn test_unknown_candidate_type() {
        assert!(matches!(
            IceCandidate::parse("f 1 UDP 2122260223 192.168.1.2 12345 typ bogus"),
            Err(ParseError::UnknownCandidateType(_))
        ));
    }

    #[test]
    fn test_extensions() {
        let c = IceCandidate::parse(&format!("{HOST} generation 0 network-id 1")).unwrap();
        assert_eq!(c, IceCandidate::parse(HOST).unwrap());

        assert_eq!(
            IceCandidate::parse(&format!("{HOST} raddr")),
            Err(ParseError::DanglingKey("raddr".to_string()))
        );
        assert_eq!(
            IceCandidate::parse(&format!("{HOST} generation 0 ufrag")),
            Err(ParseError::DanglingKey("ufrag".to_string()))
        );
        assert!(IceCandidate::parse(&format!("{HOST} rport http")).is_err());
    }

    #[test]
    fn test_candidate_prefix_is_stripped() {
        let c = IceCandidate::parse("candidate:1234567890 1 udp 2130706431 192.168.1.100 54321 typ host")
            .unwrap();
        assert_eq!(c.foundation, "1234567890");
        assert_eq!(
            c.serialize(),
            "1234567890 1 udp 2130706431 192.168.1.100 54321 typ host"
        );
        assert!(IceCandidate::parse("candidate: 1 udp 1 1.1.1.1 1 typ host x").is_err());
    }

    #[test]
    fn test_serialize_fixed_order() {
        let c = IceCandidate::parse(
            "7 2 TCP 1015022079 10.0.0.9 9 typ relay tcptype active rport 3478 raddr 198.51.100.1",
        )
        .unwrap()
        .with_sdp_mid("0");
        assert_eq!(
            c.serialize(),
            "7 2 TCP 1015022079 10.0.0.9 9 typ relay raddr 198.51.100.1 rport 3478 tcptype active"
        );
    }

    #[test]
    fn test_parse_serialize_idempotent() {
        for text in [
            HOST,
            "candidate:3 1 udp 16777215 198.51.100.20 61000 typ relay raddr 0.0.0.0 rport 0",
            "9 1 udp 1694498815 203.0.113.4 50000 typ srflx raddr 192.168.0.4 rport 50000 generation 0",
            "2 1 tcp 1518280447 192.168.0.4 9 typ host tcptype active",
            "p 2 UDP 1845501695 100.64.0.3 4500 typ prflx",
        ] {
            let first = IceCandidate::parse(text).unwrap();
            let second = IceCandidate::parse(&first.serialize()).unwrap();
            assert_eq!(first, second);
        }
    }
}
