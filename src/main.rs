use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jukebox_server::{Listener, MusicServer, ServerConfig};

#[derive(Parser, Debug)]
struct CliArgs {
    /// The port to listen on for WebSocket connections.
    #[clap(short, long, default_value_t = 8081)]
    pub port: u16,

    /// The host address to bind.
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let config = ServerConfig {
        host: cli_args.host,
        port: cli_args.port,
    };

    let music_server = Arc::new(MusicServer::new());
    let listener = Listener::new(music_server.clone(), config.clone());

    listener.start().await?;
    info!("Ready to serve at port {}!", config.port);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    listener.stop().await;

    Ok(())
}
