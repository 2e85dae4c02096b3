//! Umbra full node binary.
//!
//! Starts a node with an in-memory chain store and, when enabled, the
//! proof-of-stake forging loop. The forging key persists as hex at
//! `<data_dir>/forger.key` and is generated on first use.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use umbra_core::crypto::KeyPair;
use umbra_node_lib::{Node, NodeConfig};

/// Umbra full node.
#[derive(Parser, Debug)]
#[command(
    name = "umbra-node",
    version,
    about = "Umbra full node with confidential transactions and proof-of-stake forging"
)]
struct Args {
    /// Configuration file (TOML); CLI flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for keys and state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run the forging loop
    #[arg(long)]
    forge: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Layer CLI flags over the file/env configuration.
    fn into_config(self) -> Result<(NodeConfig, String), umbra_node_lib::NodeError> {
        let mut config = NodeConfig::load(self.config.as_deref())?;
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if self.forge {
            config.forge = true;
        }
        config.log_level = self.log_level;
        Ok((config, self.log_format))
    }
}

/// Load the forging key from `<data_dir>/forger.key`, generating and
/// persisting one if absent.
fn load_forger_key(data_dir: &std::path::Path) -> Result<KeyPair, umbra_node_lib::NodeError> {
    let path = data_dir.join("forger.key");
    if path.exists() {
        let encoded = std::fs::read_to_string(&path)?;
        let mut secret = [0u8; 32];
        hex::decode_to_slice(encoded.trim(), &mut secret)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        return Ok(KeyPair::from_secret_bytes(secret));
    }
    let keypair = KeyPair::generate();
    std::fs::write(&path, hex::encode(keypair.secret_bytes()))?;
    info!(path = %path.display(), "generated a new forging key");
    Ok(keypair)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, log_format) = match args.into_config() {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            process::exit(1);
        }
    };

    init_logging(&config.log_level, &log_format);

    info!("Umbra Full Node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("forge: {}", config.forge);

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("failed to create data_dir: {e}");
        process::exit(1);
    }

    let node = Node::new(config.clone());
    let (height, tip) = node.chain_tip();
    info!(height, tip = %tip, "node initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let forging = if config.forge {
        let keypair = match load_forger_key(&config.data_dir) {
            Ok(keypair) => keypair,
            Err(e) => {
                error!("failed to load forging key: {e}");
                process::exit(1);
            }
        };
        info!(key = %hex::encode(keypair.public_key().to_bytes()), "forging enabled");
        Some(node.start_forging(keypair, shutdown_rx))
    } else {
        None
    };

    info!("Umbra node running (Ctrl+C to stop)");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {e}");
    }
    info!("received Ctrl+C, shutting down...");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = forging {
        let _ = handle.await;
    }
    info!("Umbra node shutdown complete");
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output (suitable for log
/// aggregation pipelines). Any other value defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
