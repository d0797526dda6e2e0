//! Shrimp market server binary.
//!
//! - `shrimp-server` - listen on the configured address (default 0.0.0.0:8080)
//! - `shrimp-server --config server.yaml` - load settings from YAML
//! - `shrimp-server --bind 127.0.0.1:9000` - override the listen address

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use shrimp_server::{Server, ServerConfig};

#[derive(Parser)]
#[command(name = "shrimp-server")]
#[command(about = "Lobby and round coordinator for the shrimp market game", version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("shrimp_server=debug")
        } else {
            EnvFilter::new("shrimp_server=info")
        }
    });

    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = ServerConfig::load_or_default(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    info!(
        "Shrimp server v{} (protocol {})",
        env!("CARGO_PKG_VERSION"),
        config.protocol_version
    );

    let server = Server::bind(config)
        .await
        .context("Failed to start server")?;

    tokio::select! {
        result = server.run() => result.context("Server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
