use crate::state::{ResponderEntry, ResponderState, TrackingState};
use ethereum_types::{Address, U256};
use pisa_blockchain::BlockCache;
use pisa_machine::Component;
use pisa_types::{Action, AppointmentId, Block, BlockHash, BlockNumber, TransactionIdentifier};
use serde_json::Value;
use std::sync::Arc;

/// A gas-queue slot the multi-responder currently considers in flight, as
/// seen by the responder reducer.
#[derive(Debug, Clone)]
pub struct TrackedEntry {
    pub appointment_id: AppointmentId,
    pub identifier: TransactionIdentifier,
    pub nonce: U256,
    pub observed_at_block: BlockNumber,
}

/// Read-only view onto the multi-responder's live transaction-set, used to
/// seed newly-accepted appointments into the reducer's anchor state.
pub trait TrackedSource: Send + Sync {
    fn tracked(&self) -> Vec<TrackedEntry>;
}

/// Tracks every appointment the multi-responder has accepted through
/// Pending, Mined and Confirmed.
pub struct Responder {
    source: Arc<dyn TrackedSource>,
    operator_address: Address,
    confirmations_required: u64,
    stuck_patience: u64,
}

impl Responder {
    pub fn new(source: Arc<dyn TrackedSource>, operator_address: Address, confirmations_required: u64, stuck_patience: u64) -> Self {
        Responder { source, operator_address, confirmations_required, stuck_patience }
    }

    /// Finds a mined transaction matching `(identifier, operatorAddress)` in
    /// `block`'s ancestry at a height no earlier than `observed_at_block`
    /// (we never claim a mine we could not have seen).
    fn find_mined(&self, block: &Block, cache: &BlockCache, identifier: &TransactionIdentifier, observed_at_block: BlockNumber) -> Option<(BlockNumber, BlockHash)> {
        cache
            .find_ancestor(block.hash, observed_at_block, |candidate| {
                candidate.transactions.iter().flatten().any(|tx| {
                    tx.from == self.operator_address
                        && tx.to == Some(identifier.to)
                        && tx.value == identifier.value
                        && tx.gas_limit == identifier.gas_limit
                        && tx.input == identifier.calldata
                })
            })
            .map(|hash| (cache.get(&hash).number, hash))
    }

    /// True if a previously-mined block is still on the chain ending at
    /// `block`, mirroring the watcher's own reorg-safety check: a reorg can
    /// discard the block a transaction was mined in just as easily as one a
    /// triggering event was observed in.
    fn still_canonical(&self, block: &Block, cache: &BlockCache, at_block: BlockNumber, at_hash: BlockHash) -> bool {
        cache.find_ancestor(block.hash, at_block, |candidate| candidate.number == at_block && candidate.hash == at_hash).is_some()
    }
}

impl Component for Responder {
    fn name(&self) -> &'static str {
        "responder"
    }

    fn initial_state(&self, _block: &Block) -> Value {
        serde_json::to_value(ResponderState::default()).expect("ResponderState always serializes")
    }

    fn reduce(&self, prev: &Value, block: &Block, cache: &BlockCache) -> Value {
        let prev: ResponderState = serde_json::from_value(prev.clone()).unwrap_or_default();
        let mut entries = prev.entries.clone();

        for tracked in self.source.tracked() {
            entries.entry(tracked.appointment_id).or_insert_with(|| ResponderEntry {
                identifier: tracked.identifier,
                nonce: tracked.nonce,
                observed_at_block: tracked.observed_at_block,
                state: TrackingState::Pending,
                stuck_emitted: false,
            });
        }

        for entry in entries.values_mut() {
            entry.state = match &entry.state {
                TrackingState::Confirmed { mined_at_block, mined_at_hash } => {
                    if self.still_canonical(block, cache, *mined_at_block, *mined_at_hash) {
                        TrackingState::Confirmed { mined_at_block: *mined_at_block, mined_at_hash: *mined_at_hash }
                    } else {
                        TrackingState::Pending
                    }
                }
                TrackingState::Mined { mined_at_block, mined_at_hash } => {
                    if !self.still_canonical(block, cache, *mined_at_block, *mined_at_hash) {
                        TrackingState::Pending
                    } else if block.number.saturating_sub(*mined_at_block) >= self.confirmations_required {
                        TrackingState::Confirmed { mined_at_block: *mined_at_block, mined_at_hash: *mined_at_hash }
                    } else {
                        TrackingState::Mined { mined_at_block: *mined_at_block, mined_at_hash: *mined_at_hash }
                    }
                }
                TrackingState::Pending => match self.find_mined(block, cache, &entry.identifier, entry.observed_at_block) {
                    Some((mined_at_block, mined_at_hash)) => TrackingState::Mined { mined_at_block, mined_at_hash },
                    None => TrackingState::Pending,
                },
            };

            if !entry.stuck_emitted
                && entry.state == TrackingState::Pending
                && block.number.saturating_sub(entry.observed_at_block) >= self.stuck_patience
            {
                entry.stuck_emitted = true;
            }
        }

        let tracked_ids: std::collections::BTreeSet<_> = self.source.tracked().into_iter().map(|t| t.appointment_id).collect();
        entries.retain(|id, entry| entry.state != TrackingState::Pending || tracked_ids.contains(id));

        let next = ResponderState { as_of_block: block.number, entries };
        serde_json::to_value(next).expect("ResponderState always serializes")
    }

    fn detect_changes(&self, prev: &Value, next: &Value) -> Vec<Action> {
        let prev: ResponderState = serde_json::from_value(prev.clone()).unwrap_or_default();
        let next: ResponderState = serde_json::from_value(next.clone()).unwrap_or_default();
        let mut actions = Vec::new();

        let mut missing: Vec<AppointmentId> = prev
            .entries
            .iter()
            .filter(|(id, entry)| entry.state == TrackingState::Pending && !next.entries.contains_key(*id))
            .map(|(id, _)| *id)
            .collect();

        // A Mined/Confirmed entry demoted back to Pending means the block it
        // was anchored to fell out of the canonical chain. The multi-responder
        // already consumed its gas-queue slot on the original TxMined, so
        // nothing will rebroadcast it unless it is re-enqueued here too.
        missing.extend(next.entries.iter().filter_map(|(id, entry)| {
            let was_mined_or_confirmed = matches!(prev.entries.get(id).map(|e| &e.state), Some(TrackingState::Mined { .. }) | Some(TrackingState::Confirmed { .. }));
            (was_mined_or_confirmed && entry.state == TrackingState::Pending).then_some(*id)
        }));

        if !missing.is_empty() {
            actions.push(Action::ReEnqueueMissingItems { appointment_ids: missing });
        }

        for (id, entry) in &next.entries {
            let prior = prev.entries.get(id);
            let was_mined_or_confirmed = matches!(prior.map(|e| &e.state), Some(TrackingState::Mined { .. }) | Some(TrackingState::Confirmed { .. }));

            if let TrackingState::Mined { .. } = entry.state {
                if !was_mined_or_confirmed {
                    actions.push(Action::TxMined { identifier: entry.identifier.clone(), nonce: entry.nonce });
                    actions.push(Action::CheckResponderBalance);
                }
            }

            let was_confirmed = matches!(prior.map(|e| &e.state), Some(TrackingState::Confirmed { .. }));
            if matches!(entry.state, TrackingState::Confirmed { .. }) && !was_confirmed {
                actions.push(Action::EndResponse { appointment_id: *id });
            }

            let was_stuck_emitted = prior.map(|e| e.stuck_emitted).unwrap_or(false);
            if entry.stuck_emitted && !was_stuck_emitted {
                actions.push(Action::StuckTx { appointment_id: *id, submitted_at_block: entry.observed_at_block });
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::{H256, U256};
    use pisa_types::MinedTransaction;
    use std::sync::Mutex;

    struct FixedSource(Mutex<Vec<TrackedEntry>>);

    impl TrackedSource for FixedSource {
        fn tracked(&self) -> Vec<TrackedEntry> {
            self.0.lock().unwrap().clone()
        }
    }

    fn identifier(id: u64) -> TransactionIdentifier {
        TransactionIdentifier::new(1, vec![id as u8], Address::from_low_u64_be(2), U256::zero(), U256::from(21000))
    }

    fn tracked(id: u64) -> TrackedEntry {
        TrackedEntry { appointment_id: H256::from_low_u64_be(id), identifier: identifier(id), nonce: U256::zero(), observed_at_block: 0 }
    }

    fn block(n: u64, hash: u8, parent: u8, mined: Option<u64>) -> Block {
        let transactions = mined.map(|id| {
            vec![MinedTransaction {
                hash: H256::zero(),
                from: Address::from_low_u64_be(1),
                to: Some(Address::from_low_u64_be(2)),
                value: U256::zero(),
                gas_limit: U256::from(21000),
                input: vec![id as u8],
                nonce: U256::zero(),
            }]
        });
        Block { hash: H256::from_low_u64_be(hash as u64), parent_hash: H256::from_low_u64_be(parent as u64), number: n, transaction_hashes: vec![], logs: vec![], transactions }
    }

    #[test]
    fn reorg_discarding_the_mined_block_demotes_back_to_pending_and_requeues() {
        let source = Arc::new(FixedSource(Mutex::new(vec![tracked(1)])));
        let responder = Responder::new(source, Address::from_low_u64_be(1), 6, 20);
        let mut cache = BlockCache::new(0, 100);

        cache.add_block(block(0, 1, 0, None));
        cache.add_block(block(1, 2, 1, Some(1)));

        let state0 = responder.initial_state(&block(0, 1, 0, None));
        let mined_tip = block(1, 2, 1, Some(1));
        let state1 = responder.reduce(&state0, &mined_tip, &cache);
        let parsed: ResponderState = serde_json::from_value(state1.clone()).unwrap();
        assert!(matches!(parsed.entries[&H256::from_low_u64_be(1)].state, TrackingState::Mined { .. }));

        // A competing block at the same height replaces the one the tx was
        // mined in; the responder must not keep trusting the stale mine.
        cache.add_block(block(1, 5, 1, None));
        cache.add_block(block(2, 6, 5, None));
        let reorg_tip = block(2, 6, 5, None);

        let state2 = responder.reduce(&state1, &reorg_tip, &cache);
        let parsed2: ResponderState = serde_json::from_value(state2.clone()).unwrap();
        assert_eq!(parsed2.entries[&H256::from_low_u64_be(1)].state, TrackingState::Pending);

        let actions = responder.detect_changes(&state1, &state2);
        assert!(actions.contains(&Action::ReEnqueueMissingItems { appointment_ids: vec![H256::from_low_u64_be(1)] }));
    }
}
