//! Structural fingerprint used to recognize our own broadcasts on chain.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Identifies a logical response transaction independent of its nonce or gas
/// price. Two in-flight responses with an equal identifier are the same
/// request and share a nonce slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionIdentifier {
    pub chain_id: u64,
    pub calldata: Vec<u8>,
    pub to: Address,
    pub value: U256,
    pub gas_limit: U256,
}

impl TransactionIdentifier {
    pub fn new(chain_id: u64, calldata: Vec<u8>, to: Address, value: U256, gas_limit: U256) -> Self {
        TransactionIdentifier { chain_id, calldata, to, value, gas_limit }
    }
}
