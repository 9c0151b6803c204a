//! Session configuration.
//!
//! Everything a connection attempt needs is passed in explicitly and checked
//! when the configuration is built, so a bad token or endpoint surfaces as
//! [`NethernetError::Config`] before any I/O happens.

use crate::error::{NethernetError, Result};
use crate::negotiation::NegotiationConfig;
use crate::protocol::constants::{
    DEFAULT_ANSWER_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_ICE_TIMEOUT, DEFAULT_SIGNALING_URL,
    DEFAULT_STUN_SERVER, SESSION_ID_PLACEHOLDER,
};
use crate::signaling::Credentials;
use std::time::Duration;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use url::Url;

/// Environment variable holding the session identifier.
pub const ENV_SESSION_ID: &str = "SESSION_ID";
/// Environment variable holding the bearer token.
pub const ENV_TOKEN: &str = "MCTOKEN";

#[derive(Clone)]
pub struct SessionConfig {
    pub session_id: String,
    pub token: String,
    /// Endpoint template containing `{session_id}`
    pub signaling_url: String,
    /// Headers sent with the WebSocket handshake besides `Authorization`
    pub headers: Vec<(String, String)>,
    /// STUN/TURN URLs handed to the WebRTC engine
    pub ice_servers: Vec<String>,
    pub connect_timeout: Duration,
    pub answer_timeout: Duration,
    pub ice_timeout: Duration,
    /// Wait for the server's first frame before negotiating
    pub await_initial_message: bool,
}

impl SessionConfig {
    /// Builds a validated configuration with default endpoint and timeouts.
    pub fn new(session_id: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let config = Self {
            session_id: session_id.into(),
            token: token.into(),
            signaling_url: DEFAULT_SIGNALING_URL.to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            answer_timeout: DEFAULT_ANSWER_TIMEOUT,
            ice_timeout: DEFAULT_ICE_TIMEOUT,
            await_initial_message: true,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads `SESSION_ID` and `MCTOKEN` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`SessionConfig::from_env`], with a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let session_id = lookup(ENV_SESSION_ID)
            .ok_or_else(|| NethernetError::Config(format!("{} is not set", ENV_SESSION_ID)))?;
        let token = lookup(ENV_TOKEN)
            .ok_or_else(|| NethernetError::Config(format!("{} is not set", ENV_TOKEN)))?;
        Self::new(session_id, token)
    }

    pub fn with_signaling_url(mut self, template: impl Into<String>) -> Result<Self> {
        self.signaling_url = template.into();
        self.validate()?;
        Ok(self)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.headers.push((name.into(), value.into()));
        self.validate()?;
        Ok(self)
    }

    pub fn with_ice_servers(mut self, servers: Vec<String>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.connect_timeout = timeout;
        self.validate()?;
        Ok(self)
    }

    pub fn with_answer_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.answer_timeout = timeout;
        self.validate()?;
        Ok(self)
    }

    pub fn with_ice_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.ice_timeout = timeout;
        self.validate()?;
        Ok(self)
    }

    pub fn with_initial_message(mut self, await_initial_message: bool) -> Self {
        self.await_initial_message = await_initial_message;
        self
    }

    /// Checks every field; returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.session_id.is_empty() {
            return Err(config_error("session id is empty"));
        }
        if self.session_id.chars().any(char::is_whitespace) {
            return Err(config_error("session id contains whitespace"));
        }
        if self.token.trim().is_empty() {
            return Err(config_error("bearer token is empty"));
        }
        if !self.signaling_url.contains(SESSION_ID_PLACEHOLDER) {
            return Err(NethernetError::Config(format!(
                "signaling url template {:?} lacks {}",
                self.signaling_url, SESSION_ID_PLACEHOLDER
            )));
        }
        self.endpoint()?;
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NethernetError::Config(format!("invalid header name {name:?}: {e}")))?;
            HeaderValue::from_str(value)
                .map_err(|e| NethernetError::Config(format!("invalid value for header {name}: {e}")))?;
        }
        HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| config_error("bearer token is not a valid header value"))?;
        for (what, timeout) in [
            ("connect", self.connect_timeout),
            ("answer", self.answer_timeout),
            ("ICE", self.ice_timeout),
        ] {
            if timeout.is_zero() {
                return Err(NethernetError::Config(format!("{what} timeout must be non-zero")));
            }
        }
        Ok(())
    }

    /// Resolves the endpoint template for this session; `http(s)` maps to `ws(s)`.
    pub fn endpoint(&self) -> Result<Url> {
        let raw = self
            .signaling_url
            .replace(SESSION_ID_PLACEHOLDER, &self.session_id);
        let mut url = Url::parse(&raw)
            .map_err(|e| NethernetError::Config(format!("invalid signaling url {raw}: {e}")))?;
        let scheme = match url.scheme() {
            "wss" | "https" => "wss",
            "ws" | "http" => "ws",
            other => {
                return Err(NethernetError::Config(format!(
                    "unsupported signaling url scheme: {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| config_error("invalid websocket scheme"))?;
        Ok(url)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            bearer_token: self.token.clone(),
            headers: self.headers.clone(),
        }
    }

    pub fn negotiation(&self) -> NegotiationConfig {
        NegotiationConfig {
            answer_timeout: self.answer_timeout,
            ice_timeout: self.ice_timeout,
        }
    }
}

fn config_error(msg: &str) -> NethernetError {
    NethernetError::Config(msg.to_string())
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("session_id", &self.session_id)
            .field("token", &"<redacted>")
            .field("signaling_url", &self.signaling_url)
            .field("headers", &self.headers)
            .field("ice_servers", &self.ice_servers)
            .field("connect_timeout", &self.connect_timeout)
            .field("answer_timeout", &self.answer_timeout)
            .field("ice_timeout", &self.ice_timeout)
            .field("await_initial_message", &self.await_initial_message)
            .finish()
    }
}
