// This file is part of the PISA watchtower core.

//! Read-only node RPC and broadcast surfaces the core consumes.
//!
//! These are interfaces, not implementations: a concrete JSON-RPC client
//! lives outside the core's scope. Components are generic over these traits
//! the way `ethcore`'s reducers and pool are generic over
//! `client::Client`/`client::NonceClient` rather than a concrete node.

mod error;

pub use error::NodeError;

use ethereum_types::{Address, H256, U256};
use pisa_types::{Block, BlockNumber};
use std::sync::Arc;

/// The node's read-only JSON-RPC surface.
pub trait NodeClient: Send + Sync {
    fn get_block_number(&self) -> Result<BlockNumber, NodeError>;
    fn get_block_by_hash(&self, hash: H256) -> Result<Option<Block>, NodeError>;
    fn get_block_by_number(&self, number: BlockNumber, with_txs: bool) -> Result<Option<Block>, NodeError>;
    fn get_code(&self, address: Address) -> Result<Vec<u8>, NodeError>;
    fn get_transaction_count(&self, address: Address, pending: bool) -> Result<U256, NodeError>;
    fn get_balance(&self, address: Address) -> Result<U256, NodeError>;
    fn get_gas_price(&self) -> Result<U256, NodeError>;
    fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<H256, NodeError>;
}

/// Lets a single concrete client be shared (block processor, gas estimator,
/// balance/broadcast adapter) without each collaborator needing its own
/// connection.
impl<T: NodeClient + ?Sized> NodeClient for Arc<T> {
    fn get_block_number(&self) -> Result<BlockNumber, NodeError> {
        (**self).get_block_number()
    }

    fn get_block_by_hash(&self, hash: H256) -> Result<Option<Block>, NodeError> {
        (**self).get_block_by_hash(hash)
    }

    fn get_block_by_number(&self, number: BlockNumber, with_txs: bool) -> Result<Option<Block>, NodeError> {
        (**self).get_block_by_number(number, with_txs)
    }

    fn get_code(&self, address: Address) -> Result<Vec<u8>, NodeError> {
        (**self).get_code(address)
    }

    fn get_transaction_count(&self, address: Address, pending: bool) -> Result<U256, NodeError> {
        (**self).get_transaction_count(address, pending)
    }

    fn get_balance(&self, address: Address) -> Result<U256, NodeError> {
        (**self).get_balance(address)
    }

    fn get_gas_price(&self) -> Result<U256, NodeError> {
        (**self).get_gas_price()
    }

    fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<H256, NodeError> {
        (**self).send_raw_transaction(raw)
    }
}

/// Yields a current gas price given the latest block. Kept separate from
/// [`NodeClient`] because some deployments price gas from a strategy
/// (EIP-1559 base-fee tracking, a fixed multiplier) rather than a bare RPC
/// passthrough.
pub trait GasPriceEstimator: Send + Sync {
    fn estimate(&self, latest_block: &Block) -> Result<U256, NodeError>;
}

/// A [`GasPriceEstimator`] that simply forwards to `eth_gasPrice`.
pub struct NodeGasPriceEstimator<C> {
    client: C,
}

impl<C: NodeClient> NodeGasPriceEstimator<C> {
    pub fn new(client: C) -> Self {
        NodeGasPriceEstimator { client }
    }
}

impl<C: NodeClient> GasPriceEstimator for NodeGasPriceEstimator<C> {
    fn estimate(&self, _latest_block: &Block) -> Result<U256, NodeError> {
        self.client.get_gas_price()
    }
}
