use super::{ConnectivityState, DataChannelKind, PeerEngine, SdpType, SessionDescription};
use crate::error::{NethernetError, Result};
use crate::protocol::IceCandidate;
use crate::protocol::constants::DEFAULT_CANDIDATE_CHANNEL_CAPACITY;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use webrtc::api::APIBuilder;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// [`PeerEngine`] backed by a `webrtc` peer connection.
pub struct RtcEngine {
    peer_connection: Arc<RTCPeerConnection>,
    reliable_channel: Mutex<Option<Arc<RTCDataChannel>>>,
    unreliable_channel: Mutex<Option<Arc<RTCDataChannel>>>,
    candidate_rx: std::sync::Mutex<Option<mpsc::Receiver<IceCandidate>>>,
    state_rx: watch::Receiver<ConnectivityState>,
    closed: RwLock<bool>,
}

impl RtcEngine {
    /// Creates a peer connection using the given STUN/TURN URLs.
    ///
    /// Candidate discovery and connection state changes are wired into
    /// channels here, before any description is set, so nothing is missed.
    pub async fn new(ice_servers: &[String]) -> Result<Self> {
        let api = APIBuilder::new()
            .with_media_engine(MediaEngine::default())
            .with_setting_engine(SettingEngine::default())
            .build();

        let config = RTCConfiguration {
            ice_servers: if ice_servers.is_empty() {
                Vec::new()
            } else {
                vec![RTCIceServer {
                    urls: ice_servers.to_vec(),
                    ..Default::default()
                }]
            },
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(config).await?);

        let (candidate_tx, candidate_rx) = mpsc::channel(DEFAULT_CANDIDATE_CHANNEL_CAPACITY);
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = candidate_tx.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    tracing::debug!("local candidate gathering complete");
                    return;
                };
                match local_candidate(&candidate) {
                    Ok(candidate) => {
                        // receiver dropped once negotiation is over
                        let _ = tx.send(candidate).await;
                    }
                    Err(e) => tracing::warn!("dropping unparsable local candidate: {}", e),
                }
            })
        }));

        let (state_tx, state_rx) = watch::channel(ConnectivityState::New);
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                tracing::debug!(%state, "peer connection state changed");
                let _ = state_tx.send(ConnectivityState::from(state));
                Box::pin(async {})
            },
        ));

        Ok(Self {
            peer_connection,
            reliable_channel: Mutex::new(None),
            unreliable_channel: Mutex::new(None),
            candidate_rx: std::sync::Mutex::new(Some(candidate_rx)),
            state_rx,
            closed: RwLock::new(false),
        })
    }

    /// Returns the data channel of the given kind once it has been created.
    pub async fn data_channel(&self, kind: DataChannelKind) -> Option<Arc<RTCDataChannel>> {
        match kind {
            DataChannelKind::Reliable => self.reliable_channel.lock().await.clone(),
            DataChannelKind::Unreliable => self.unreliable_channel.lock().await.clone(),
        }
    }

    pub fn peer_connection(&self) -> Arc<RTCPeerConnection> {
        self.peer_connection.clone()
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }
}

impl From<RTCPeerConnectionState> for ConnectivityState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => ConnectivityState::New,
            RTCPeerConnectionState::Connecting => ConnectivityState::Connecting,
            RTCPeerConnectionState::Connected => ConnectivityState::Connected,
            RTCPeerConnectionState::Disconnected => ConnectivityState::Disconnected,
            RTCPeerConnectionState::Failed => ConnectivityState::Failed,
            RTCPeerConnectionState::Closed => ConnectivityState::Closed,
        }
    }
}

/// Converts an engine-discovered candidate through the text codec.
fn local_candidate(candidate: &RTCIceCandidate) -> Result<IceCandidate> {
    let init = candidate.to_json()?;
    let mut parsed = IceCandidate::parse(&init.candidate)?;
    parsed.sdp_mid = init.sdp_mid.filter(|mid| !mid.is_empty());
    parsed.sdp_mline_index = init.sdp_mline_index;
    Ok(parsed)
}

fn candidate_init(candidate: &IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: format!("candidate:{}", candidate.serialize()),
        sdp_mid: candidate.sdp_mid.clone(),
        sdp_mline_index: candidate.sdp_mline_index,
        ..Default::default()
    }
}

fn rtc_description(description: SessionDescription) -> Result<RTCSessionDescription> {
    let desc = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    Ok(desc)
}

impl PeerEngine for RtcEngine {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(rtc_description(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(rtc_description(description)?)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(candidate_init(&candidate))
            .await?;
        Ok(())
    }

    fn local_candidates(&self) -> Result<mpsc::Receiver<IceCandidate>> {
        self.candidate_rx
            .lock()
            .map_err(|_| NethernetError::InvalidState("candidate receiver lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| {
                NethernetError::InvalidState("local candidates already subscribed".to_string())
            })
    }

    async fn create_data_channel(&self, kind: DataChannelKind) -> Result<()> {
        let init = match kind {
            DataChannelKind::Reliable => RTCDataChannelInit {
                ordered: Some(true),
                ..Default::default()
            },
            DataChannelKind::Unreliable => RTCDataChannelInit {
                ordered: Some(false),
                max_retransmits: Some(0),
                ..Default::default()
            },
        };

        let channel = self
            .peer_connection
            .create_data_channel(kind.label(), Some(init))
            .await?;

        let label = kind.label();
        channel.on_open(Box::new(move || {
            tracing::debug!(label, "data channel open");
            Box::pin(async {})
        }));

        let slot = match kind {
            DataChannelKind::Reliable => &self.reliable_channel,
            DataChannelKind::Unreliable => &self.unreliable_channel,
        };
        *slot.lock().await = Some(channel);
        Ok(())
    }

    fn connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.state_rx.clone()
    }

    async fn close(&self) -> Result<()> {
        let mut closed = self.closed.write().await;
        if *closed {
            return Ok(());
        }
        *closed = true;
        drop(closed);

        let reliable = self.reliable_channel.lock().await.clone();
        if let Some(channel) = reliable {
            let _ = channel.close().await;
        }

        let unreliable = self.unreliable_channel.lock().await.clone();
        if let Some(channel) = unreliable {
            let _ = channel.close().await;
        }

        self.peer_connection.close().await?;
        tracing::debug!("peer connection closed");
        Ok(())
    }
}
