// This file is part of the PISA watchtower core.

//! Composition root: wires the durable store, the concrete node client, the
//! operator's signing key and every reducer/dispatcher into a running
//! watchtower, then drives the poll loop until told to stop.

use clap::Parser;
use ethereum_types::U256;
use log::{error, info, warn};
use pisa::dispatch::{AppointmentStoreDispatcher, MultiResponderDispatcher};
use pisa::node_client::Web3NodeClient;
use pisa::operator::{self, OperatorSigner};
use pisa_appointments::AppointmentStore;
use pisa_blockchain::{BlockCache, BlockProcessor};
use pisa_config::{Args, Config};
use pisa_machine::BlockchainMachine;
use pisa_responder::{MultiResponder, Responder, ResponderStore, StartResponseDispatcher};
use pisa_watcher::Watcher;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    let args = Args::parse();
    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            process::exit(2);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter.clone())).init();

    if let Err(e) = run(config) {
        error!(target: "pisa", "fatal: {e}");
        process::exit(1);
    }
}

fn run(config: Config) -> Result<(), String> {
    std::fs::create_dir_all(&config.data_dir).map_err(|e| format!("failed to create data dir {}: {e}", config.data_dir.display()))?;
    let store = pisa_store::open_rocksdb(&config.data_dir.display().to_string()).map_err(|e| e.to_string())?;

    let secret_key = operator::load_secret_key(&config.operator_key_path)?;
    let node_client = Arc::new(Web3NodeClient::new(&config.node_rpc_url).map_err(|e| e.to_string())?);
    let operator_signer = Arc::new(OperatorSigner::new(node_client.clone(), secret_key, config.chain_id));

    let low_balance_threshold =
        U256::from_dec_str(&config.low_balance_threshold_wei).map_err(|e| format!("invalid low_balance_threshold_wei: {e}"))?;

    let cache = bootstrap_cache(&store, &config)?;

    let appointment_store = Arc::new(AppointmentStore::open(store.clone()).map_err(|e| e.to_string())?);
    let responder_store = ResponderStore::new(store.clone(), config.operator_address);
    let multi_responder = Arc::new(
        MultiResponder::new(
            responder_store,
            operator_signer.clone(),
            operator_signer.clone(),
            config.operator_address,
            config.chain_id,
            config.gas_queue_replacement_rate,
            config.gas_queue_max_depth,
            low_balance_threshold,
        )
        .map_err(|e| e.to_string())?,
    );

    let watcher = Watcher::new(appointment_store.clone(), config.confirmations_required, config.max_reorg_limit);
    let responder = Responder::new(multi_responder.clone(), config.operator_address, config.confirmations_required, config.stuck_patience_blocks);
    let start_response = StartResponseDispatcher::new(multi_responder.clone(), appointment_store.clone());

    let mut machine = BlockchainMachine::new(store.clone());
    machine.register_component(Box::new(watcher));
    machine.register_component(Box::new(responder));
    machine.register_dispatcher(Box::new(MultiResponderDispatcher::new(multi_responder.clone())));
    machine.register_dispatcher(Box::new(AppointmentStoreDispatcher::new(appointment_store.clone())));
    machine.register_dispatcher(Box::new(start_response));
    machine.replay_undispatched().map_err(|e| e.to_string())?;

    let mut processor = BlockProcessor::new(node_client.clone(), cache);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        warn!(target: "pisa", "shutdown signal received");
        handler_flag.store(false, Ordering::SeqCst);
    })
    .map_err(|e| format!("failed to install signal handler: {e}"))?;

    info!(target: "pisa", "watchtower started, polling every {}ms", config.poll_interval_ms);

    while running.load(Ordering::SeqCst) {
        if let Err(e) = processor.poll(&mut machine) {
            warn!(target: "blockchain", "poll failed: {e}");
        }

        let head_number = processor.cache().head().map(|h| processor.cache().get(&h).number).unwrap_or(0);
        for expired in appointment_store.expired_since(head_number) {
            if let Err(e) = appointment_store.remove_by_id(&expired.customer_chosen_id) {
                warn!(target: "appointments", "failed to remove expired appointment {:?}: {e}", expired.customer_chosen_id);
            }
        }

        std::thread::sleep(Duration::from_millis(config.poll_interval_ms));
    }

    shutdown(&store);
    Ok(())
}

/// Bootstraps the block cache from the last-committed head if one was
/// persisted, so a restart resumes from where the previous run left off
/// instead of re-deriving everything from `block_cache_initial_height`.
fn bootstrap_cache(store: &pisa_store::Store, config: &Config) -> Result<BlockCache, String> {
    match store.get_head().map_err(|e| e.to_string())? {
        Some(head_hash) => {
            let head_block = store
                .get_block(&head_hash)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("persisted head {head_hash:?} has no matching block record"))?;
            info!(target: "pisa", "resuming from persisted head at block {}", head_block.number);
            let mut cache = BlockCache::new(head_block.number, config.block_cache_max_depth);
            cache.add_block(head_block);
            cache.set_head(head_hash);
            Ok(cache)
        }
        None => {
            info!(target: "pisa", "no persisted head, starting fresh from height {}", config.block_cache_initial_height);
            Ok(BlockCache::new(config.block_cache_initial_height, config.block_cache_max_depth))
        }
    }
}

/// Logged shutdown in component dependency order: the responder and
/// appointment stores stop accepting new work before the underlying store
/// handle (shared by both, via `Arc`) is dropped and flushed.
fn shutdown(_store: &pisa_store::Store) {
    info!(target: "pisa", "shutting down: responder store, appointment store, processor, machine, action store, block store");
}
