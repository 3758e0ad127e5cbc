//! obs-launcherd - WebSocket launcher service for OBS Studio.
//!
//! Listens for WebSocket clients, gives each one a session, and supervises
//! at most one OBS Studio process per session. When a client disconnects,
//! its process is terminated.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obs_launcherd::{
    config::{Config, DEFAULT_IP_ADDRESS, DEFAULT_OBS_WORKING_DIRECTORY},
    server::{self, AppState},
};

/// obs-launcherd - WebSocket launcher service for OBS Studio.
#[derive(Parser, Debug)]
#[command(name = "obs-launcherd", version, about, long_about = None)]
struct Cli {
    /// Host to bind the WebSocket server
    #[arg(long, env = "WEBSOCKET_SERVER_IP_ADDRESS", default_value = DEFAULT_IP_ADDRESS)]
    ip_address: String,

    /// Port to bind the WebSocket server
    #[arg(long, env = "WEBSOCKET_SERVER_PORT", default_value_t = 8765)]
    port: u16,

    /// Directory containing the OBS Studio executable
    #[arg(long, env = "OBS_STUDIO_WORKING_DIRECTORY", default_value = DEFAULT_OBS_WORKING_DIRECTORY)]
    obs_directory: PathBuf,

    /// OBS Studio executable file name
    #[arg(long, env = "OBS_STUDIO_EXECUTABLE_FILE", default_value = "obs64.exe")]
    obs_executable: String,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "obs_launcherd=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config {
        ip_address: cli.ip_address,
        port: cli.port,
        obs_directory: cli.obs_directory,
        obs_executable: cli.obs_executable,
    };

    tracing::info!("obs-launcherd starting");
    tracing::info!(
        executable = %config.executable_path().display(),
        "launch target configured"
    );

    let bind_addr = config.bind_addr();
    let state = AppState::new(config);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "WebSocket server listening");

    axum::serve(listener, app).await?;
    tracing::info!("WebSocket server stopped");
    Ok(())
}
