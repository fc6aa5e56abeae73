// This file is part of the PISA watchtower core.

//! Layered configuration: built-in defaults, an optional TOML file, then
//! command-line overrides, in that order (lowest to highest precedence).

mod error;

pub use error::ConfigError;

use ethereum_types::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything the watchtower binary needs to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node_rpc_url: String,
    pub chain_id: u64,
    pub operator_address: Address,
    /// Path to a file holding the operator's hex-encoded secp256k1 private
    /// key. Key management otherwise lives entirely outside the core.
    pub operator_key_path: PathBuf,
    pub data_dir: PathBuf,

    pub block_cache_initial_height: u64,
    pub block_cache_max_depth: u64,
    pub poll_interval_ms: u64,

    pub confirmations_required: u64,
    pub max_reorg_limit: u64,
    pub stuck_patience_blocks: u64,

    pub gas_queue_replacement_rate: u64,
    pub gas_queue_max_depth: usize,
    pub low_balance_threshold_wei: String,

    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 1,
            operator_address: Address::zero(),
            operator_key_path: PathBuf::from("./operator.key"),
            data_dir: PathBuf::from("./data"),
            block_cache_initial_height: 0,
            block_cache_max_depth: 100,
            poll_interval_ms: 12_000,
            confirmations_required: 6,
            max_reorg_limit: 100,
            stuck_patience_blocks: 20,
            gas_queue_replacement_rate: 15,
            gas_queue_max_depth: 12,
            low_balance_threshold_wei: "100000000000000000".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

/// Command-line overrides, parsed over the defaults-then-file layer.
#[derive(Debug, clap::Parser)]
#[command(name = "pisa", about = "PISA watchtower accountability service")]
pub struct Args {
    /// Path to a TOML config file layered over the built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub node_rpc_url: Option<String>,

    #[arg(long)]
    pub chain_id: Option<u64>,

    #[arg(long = "db-path")]
    pub data_dir: Option<PathBuf>,

    #[arg(long)]
    pub operator_key_path: Option<PathBuf>,

    #[arg(long)]
    pub log_filter: Option<String>,

    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Block-cache reorg window: how far the processor will walk back
    /// looking for a common ancestor before declaring a deep reorg.
    #[arg(long = "max-depth")]
    pub block_cache_max_depth: Option<u64>,

    #[arg(long)]
    pub confirmations_required: Option<u64>,

    #[arg(long = "replacement-rate")]
    pub gas_queue_replacement_rate: Option<u64>,

    #[arg(long = "max-queue-depth")]
    pub gas_queue_max_depth: Option<usize>,

    #[arg(long = "low-balance-threshold")]
    pub low_balance_threshold_wei: Option<String>,
}

impl Config {
    /// Loads defaults, overlays an optional TOML file, then CLI flags.
    pub fn load(args: &Args) -> Result<Config, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(url) = &args.node_rpc_url {
            config.node_rpc_url = url.clone();
        }
        if let Some(chain_id) = args.chain_id {
            config.chain_id = chain_id;
        }
        if let Some(dir) = &args.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &args.operator_key_path {
            config.operator_key_path = path.clone();
        }
        if let Some(filter) = &args.log_filter {
            config.log_filter = filter.clone();
        }
        if let Some(ms) = args.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(depth) = args.block_cache_max_depth {
            config.block_cache_max_depth = depth;
        }
        if let Some(confirmations) = args.confirmations_required {
            config.confirmations_required = confirmations;
        }
        if let Some(rate) = args.gas_queue_replacement_rate {
            config.gas_queue_replacement_rate = rate;
        }
        if let Some(depth) = args.gas_queue_max_depth {
            config.gas_queue_max_depth = depth;
        }
        if let Some(threshold) = &args.low_balance_threshold_wei {
            config.low_balance_threshold_wei = threshold.clone();
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))
    }
}
