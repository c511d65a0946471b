#![forbid(unsafe_code)]
//! FloodChain node: serves the line protocol, floods blocks and transactions, mines on request.

use clap::Parser;
use floodchain::config::{load_config_from, parse_host_port};
use floodchain::node::{init_logging, Node};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// Host name other nodes should use to reach this one
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
    /// Bootstrap peer as host:port (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
    /// Start mining immediately
    #[arg(long)]
    mine: bool,
    /// Wallet file holding the miner key
    #[arg(long)]
    wallet: Option<String>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = load_config_from(&cli.config)?;

    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.p2p_port = port;
    }
    for peer in &cli.peers {
        parse_host_port(peer)?;
    }
    config.network.bootstrap_peers.extend(cli.peers);
    if cli.mine {
        config.miner.enabled = true;
    }
    if let Some(wallet) = cli.wallet {
        config.miner.wallet_path = wallet;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging.level);

    let node = Arc::new(Node::init(config).await?);
    node.start().await?;
    Ok(())
}
