use clap::Parser;
use nethernet::{Session, SessionConfig};
use std::error::Error;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "nethernet-client", about = "Negotiate a NetherNet WebRTC connection")]
struct Cli {
    #[arg(long, env = "SESSION_ID", help = "Signaling session identifier")]
    session_id: String,

    #[arg(long, env = "MCTOKEN", hide_env_values = true, help = "Bearer token for the signaling service")]
    token: String,

    #[arg(long, help = "Signaling endpoint template containing {session_id}")]
    url: Option<String>,

    #[arg(long = "stun", help = "STUN/TURN server URL, may be repeated")]
    stun: Vec<String>,

    #[arg(long, default_value_t = 10, help = "Seconds to wait for the answer")]
    answer_timeout: u64,

    #[arg(long, help = "Start negotiating without waiting for the server's first frame")]
    skip_initial_message: bool,

    #[arg(long, short = 'v', help = "Log at debug level")]
    verbose: bool,
}

fn session_config(cli: &Cli) -> nethernet::Result<SessionConfig> {
    let mut config = SessionConfig::new(cli.session_id.clone(), cli.token.clone())?
        .with_answer_timeout(Duration::from_secs(cli.answer_timeout))?
        .with_initial_message(!cli.skip_initial_message);
    if let Some(url) = &cli.url {
        config = config.with_signaling_url(url.clone())?;
    }
    if !cli.stun.is_empty() {
        config = config.with_ice_servers(cli.stun.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // a missing .env is fine; variables may come from the environment
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter_layer = filter::LevelFilter::from_level(level);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .init();

    let config = session_config(&cli)?;
    tracing::info!("Connecting to signaling session {}", config.session_id);

    let session = Session::connect(config).await?;
    tracing::info!("WebRTC connection established, press Ctrl+C to close");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    session.close().await?;
    Ok(())
}
