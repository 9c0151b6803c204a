//! NetherNet signaling example.
//!
//! Reads `SESSION_ID` and `MCTOKEN` from the environment, negotiates a WebRTC
//! connection through the signaling service and reports the data channels.

use nethernet::{DataChannelKind, Session, SessionConfig};
use tracing::Level;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    let filter_layer = filter::LevelFilter::from_level(Level::DEBUG);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .init();

    let config = SessionConfig::from_env()?;
    tracing::info!("Negotiating session {}", config.session_id);

    let session = Session::connect(config).await?;
    tracing::info!("Connected in phase {}", session.phase().await);

    for kind in [DataChannelKind::Reliable, DataChannelKind::Unreliable] {
        if let Some(channel) = session.engine().data_channel(kind).await {
            tracing::info!("   {} ready: {:?}", channel.label(), channel.ready_state());
        }
    }

    let negotiation = session.negotiation();
    tracing::info!(
        "Received {} remote candidates",
        negotiation.received_remote_candidate_count
    );

    session.close().await?;
    tracing::info!("Session closed");
    Ok(())
}
