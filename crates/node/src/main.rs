//! Auction node for local testing of confidential single-price auctions.
//!
//! Loads a JSON genesis (or the defaults), deals a local decryption
//! committee and serves the engine over JSON-RPC.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use spa_engine::EngineGenesisConfig;
use spa_node::{serve, AuctionNode, ChainState};

#[derive(Parser)]
#[command(name = "spa-node")]
#[command(about = "Local JSON-RPC host for confidential single-price auctions")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Genesis configuration (JSON)
    #[arg(long)]
    genesis: Option<PathBuf>,
}

fn load_genesis(path: Option<&PathBuf>) -> Result<EngineGenesisConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading genesis {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing genesis {}", path.display()))
        }
        None => Ok(EngineGenesisConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spa_node=info".parse()?)
                .add_directive("spa_engine=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let genesis = load_genesis(args.genesis.as_ref())?;
    let chain = ChainState::from_genesis(&genesis)?;

    let (addr, handle) = serve(args.listen, AuctionNode::new(chain)).await?;
    info!("Auction node running on {}. Press Ctrl+C to stop.", addr);

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
