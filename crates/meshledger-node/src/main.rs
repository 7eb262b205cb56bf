//! MeshLedger Node - one peer of the replicated ledger.
//!
//! Ties storage, consensus and the TCP mesh transport together into a runnable
//! binary.

pub mod config;
pub mod node;
pub mod telemetry;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "meshledger-node")]
#[command(about = "MeshLedger - a peer-to-peer replicated ledger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Config file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Mesh listen address
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Bootstrap peers (comma-separated, e.g. "192.168.1.20:30400,192.168.1.21:30400")
    #[arg(long, env = "MESHLEDGER_BOOTSTRAP")]
    bootstrap: Option<String>,

    /// Maximum concurrent peer sessions
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Chain ID
    #[arg(long)]
    chain_id: Option<u64>,

    /// Keep the ledger in memory only
    #[arg(long)]
    in_memory: bool,

    /// Open an account for the miner key with this balance after startup
    #[arg(long, value_name = "AMOUNT")]
    fund: Option<u128>,

    /// Log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log as JSON
    #[arg(long)]
    json_logs: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long, value_name = "FILE")]
    dump_config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut config::NodeConfig) -> anyhow::Result<()> {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(addr) = self.listen {
            config.network.listen_addr = addr;
        }
        if let Some(bootstrap) = &self.bootstrap {
            config.network.bootstrap_peers = bootstrap
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<SocketAddr>().map_err(|e| anyhow::anyhow!("Invalid bootstrap peer '{}': {}", s, e)))
                .collect::<anyhow::Result<_>>()?;
        }
        if let Some(max) = self.max_sessions {
            config.network.max_sessions = max;
        }
        if let Some(chain_id) = self.chain_id {
            config.consensus.chain_id = chain_id;
        }
        if self.in_memory {
            config.storage.in_memory = true;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.format = "json".to_string();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::NodeConfig::from_file(path)?,
        None => config::NodeConfig::default(),
    };
    args.apply(&mut config)?;
    config.validate()?;

    if let Some(path) = &args.dump_config {
        config.to_file(path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    telemetry::init_telemetry(
        &config.logging.level,
        config.logging.format == "json",
        config.logging.log_file.as_deref(),
    )?;

    info!(
        name = %config.name,
        data_dir = %config.data_dir.display(),
        chain_id = config.consensus.chain_id,
        listen = %config.network.listen_addr,
        bootstrap = config.network.bootstrap_peers.len(),
        max_sessions = config.network.max_sessions,
        "Starting MeshLedger node"
    );

    let mut node = node::MeshNode::new(config).await?;

    if let Some(amount) = args.fund {
        let report = node.fund_miner(amount).await?;
        match report.error() {
            None => info!(amount, "Miner account queued for the next block"),
            Some(e) => warn!(error = %e, "Miner funding rejected"),
        }
    }

    if let Err(e) = node.run().await {
        error!("Node error: {}", e);
        return Err(e);
    }

    info!("MeshLedger node shutdown complete");
    Ok(())
}
