use ethereum_types::U256;
use pisa_types::{AppointmentId, BlockHash, BlockNumber, TransactionIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where one in-flight response currently stands. `Mined`/`Confirmed` carry
/// the block hash they were observed in, not just its height, so the
/// reducer can tell whether that block is still on the canonical chain
/// before trusting the state (a reorg can discard it, the way it can
/// discard a watcher's observation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    Pending,
    Mined { mined_at_block: BlockNumber, mined_at_hash: BlockHash },
    Confirmed { mined_at_block: BlockNumber, mined_at_hash: BlockHash },
}

/// Everything the responder reducer needs about one appointment it has
/// accepted, carried in the anchor state so `detect_changes` never needs to
/// consult the live transaction-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderEntry {
    pub identifier: TransactionIdentifier,
    pub nonce: U256,
    pub observed_at_block: BlockNumber,
    pub state: TrackingState,
    pub stuck_emitted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponderState {
    pub as_of_block: BlockNumber,
    pub entries: BTreeMap<AppointmentId, ResponderEntry>,
}
