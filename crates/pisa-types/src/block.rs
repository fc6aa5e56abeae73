//! The chain's elementary unit as the core sees it.

use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

/// Block hash, also the block's identity.
pub type BlockHash = H256;

/// Block height.
pub type BlockNumber = u64;

/// A log entry emitted by a transaction, trimmed to the fields a reducer's
/// event filter needs: the emitting contract, the indexed topics (event
/// signature first) and the raw data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Contract address that emitted the log.
    pub address: Address,
    /// Indexed topics, topic 0 is the event signature hash.
    pub topics: Vec<H256>,
    /// Non-indexed log data.
    pub data: Vec<u8>,
    /// Hash of the transaction this log was emitted by.
    pub transaction_hash: H256,
}

/// A transaction included in a block, trimmed to the fields the responder
/// reducer needs to recognize its own broadcasts on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedTransaction {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    pub value: ethereum_types::U256,
    pub gas_limit: ethereum_types::U256,
    pub input: Vec<u8>,
    pub nonce: ethereum_types::U256,
}

/// A linearized block as produced by the block processor.
///
/// Two blocks with equal `hash` must be equal field-wise; the block cache
/// and block item store rely on this to treat `hash` as a sufficient key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Identity of this block.
    pub hash: BlockHash,
    /// Hash of the parent block; the genesis/bootstrap block may point at
    /// a hash the cache will never see and is never asked to attach.
    pub parent_hash: BlockHash,
    /// Height in the chain.
    pub number: BlockNumber,
    /// Hashes of every transaction included in the block, in block order.
    pub transaction_hashes: Vec<H256>,
    /// Logs emitted by this block's transactions, in emission order.
    pub logs: Vec<Log>,
    /// Full transaction bodies, fetched lazily by the processor only when a
    /// registered reducer needs to inspect `from`/calldata — fetching with
    /// `withTxs=false` is the default.
    pub transactions: Option<Vec<MinedTransaction>>,
}

impl Block {
    /// True if `self` is the immediate parent of `child`.
    pub fn is_parent_of(&self, child: &Block) -> bool {
        child.parent_hash == self.hash
    }
}
