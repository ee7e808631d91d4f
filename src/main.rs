//! Arbiter server binary.

use arbiter::config::ArbiterConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Model-variant registry and A/B routing server.
#[derive(Parser)]
#[command(name = "arbiter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ARBITER_CONFIG")]
    config: Option<PathBuf>,

    /// Gateway bind address override
    #[arg(long)]
    gateway_addr: Option<SocketAddr>,

    /// Metrics bind address override
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ArbiterConfig::from_file(path)?,
        None => ArbiterConfig::development(),
    };

    if let Some(addr) = cli.gateway_addr {
        config.gateway.bind_addr = addr;
    }
    if let Some(addr) = cli.metrics_addr {
        config.observability.metrics_addr = addr;
    }
    config.observability.log_level = cli.log_level;
    config.validate()?;

    arbiter::run(config).await?;
    Ok(())
}
