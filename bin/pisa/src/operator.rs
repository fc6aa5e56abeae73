//! Wires the node client and the operator's signing key into the
//! [`BalanceProvider`] and [`Broadcaster`] traits `MultiResponder` consumes.

use crate::node_client::Web3NodeClient;
use ethereum_types::{Address, U256};
use pisa_node::{GasPriceEstimator, NodeClient, NodeGasPriceEstimator};
use pisa_responder::{BalanceProvider, Broadcaster};
use pisa_types::GasQueueItem;
use std::sync::Arc;
use web3::signing::SecretKey;
use web3::types::TransactionParameters;

pub struct OperatorSigner {
    client: Arc<Web3NodeClient>,
    gas_estimator: NodeGasPriceEstimator<Arc<Web3NodeClient>>,
    secret_key: SecretKey,
    chain_id: u64,
}

impl OperatorSigner {
    pub fn new(client: Arc<Web3NodeClient>, secret_key: SecretKey, chain_id: u64) -> Self {
        let gas_estimator = NodeGasPriceEstimator::new(client.clone());
        OperatorSigner { client, gas_estimator, secret_key, chain_id }
    }
}

impl BalanceProvider for OperatorSigner {
    fn estimate_gas_price(&self) -> Result<U256, String> {
        let tip_number = self.client.get_block_number().map_err(|e| e.to_string())?;
        let tip = self
            .client
            .get_block_by_number(tip_number, false)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("node has no block at height {tip_number}"))?;
        self.gas_estimator.estimate(&tip).map_err(|e| e.to_string())
    }

    fn balance_of(&self, address: Address) -> Result<U256, String> {
        self.client.block_on(self.client.web3().eth().balance(address, None)).map_err(|e| e.to_string())
    }
}

impl Broadcaster for OperatorSigner {
    fn broadcast(&self, item: &GasQueueItem) -> Result<(), String> {
        let identifier = item.identifier();
        let tx_params = TransactionParameters {
            nonce: Some(item.nonce),
            to: Some(identifier.to),
            value: identifier.value,
            gas: identifier.gas_limit,
            gas_price: Some(item.gas_price),
            data: identifier.calldata.clone().into(),
            chain_id: Some(self.chain_id),
            ..Default::default()
        };

        let signed = self
            .client
            .block_on(self.client.web3().accounts().sign_transaction(tx_params, &self.secret_key))
            .map_err(|e| e.to_string())?;

        self.client
            .block_on(self.client.web3().eth().send_raw_transaction(signed.raw_transaction))
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Reads a 32-byte hex-encoded private key from `path`, tolerating a leading
/// `0x` and trailing whitespace.
pub fn load_secret_key(path: &std::path::Path) -> Result<SecretKey, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read operator key at {}: {e}", path.display()))?;
    let trimmed = contents.trim().trim_start_matches("0x");
    let bytes = hex::decode(trimmed).map_err(|e| format!("operator key is not valid hex: {e}"))?;
    SecretKey::from_slice(&bytes).map_err(|e| format!("operator key is not a valid secp256k1 scalar: {e}"))
}
