//! Parlor server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: lobby room, mute lists under ./mute-lists
//! parlor-server --bind 0.0.0.0:3000
//!
//! # Custom default room and mute-list location
//! parlor-server --bind 0.0.0.0:3000 --lobby foyer --mute-dir /var/lib/parlor/mutes
//! ```

use clap::Parser;
use parlor_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parlor chat server
#[derive(Parser, Debug)]
#[command(name = "parlor-server")]
#[command(about = "Parlor multi-room chat server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Name of the default room
    #[arg(long, default_value = "lobby")]
    lobby: String,

    /// Directory for persisted mute lists
    #[arg(long, default_value = "mute-lists")]
    mute_dir: std::path::PathBuf,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Parlor server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        default_room: args.lobby,
        mute_dir: args.mute_dir,
        max_connections: args.max_connections,
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
