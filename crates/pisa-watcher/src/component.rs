use crate::matcher::block_has_match;
use crate::source::AppointmentSource;
use crate::state::{AppointmentWatch, ObservationState, WatcherState};
use pisa_blockchain::BlockCache;
use pisa_machine::Component;
use pisa_types::{Action, Block};
use serde_json::Value;
use std::sync::Arc;

/// Watches every appointment the source knows about for its triggering
/// event, gated on a confirmation depth, and retires expired appointments
/// once their window closes beyond the reorg margin.
pub struct Watcher {
    source: Arc<dyn AppointmentSource>,
    confirmations_required: u64,
    max_reorg_limit: u64,
}

impl Watcher {
    pub fn new(source: Arc<dyn AppointmentSource>, confirmations_required: u64, max_reorg_limit: u64) -> Self {
        Watcher { source, confirmations_required, max_reorg_limit }
    }

    fn observe(&self, block: &Block, cache: &BlockCache, appointment: &pisa_types::Appointment) -> ObservationState {
        let threshold = block.number.saturating_sub(self.confirmations_required);
        let found = cache.find_ancestor(block.hash, appointment.start_block, |candidate| {
            candidate.number <= threshold
                && candidate.number >= appointment.start_block
                && candidate.number <= appointment.end_block
                && block_has_match(candidate, &appointment.event_filter)
        });
        match found {
            Some(hash) => ObservationState::Observed { at_block: cache.get(&hash).number, at_hash: hash },
            None => ObservationState::NotObserved,
        }
    }

    /// True if a previously-observed block is still on the chain ending at
    /// `block`, i.e. the reorg that might have invalidated it didn't happen.
    fn still_canonical(&self, block: &Block, cache: &BlockCache, at_block: u64, at_hash: pisa_types::BlockHash) -> bool {
        cache.find_ancestor(block.hash, at_block, |candidate| candidate.number == at_block && candidate.hash == at_hash).is_some()
    }
}

impl Component for Watcher {
    fn name(&self) -> &'static str {
        "watcher"
    }

    fn initial_state(&self, _block: &Block) -> Value {
        serde_json::to_value(WatcherState::default()).expect("WatcherState always serializes")
    }

    fn reduce(&self, prev: &Value, block: &Block, cache: &BlockCache) -> Value {
        let prev: WatcherState = serde_json::from_value(prev.clone()).unwrap_or_default();
        let mut next = WatcherState { as_of_block: block.number, watches: prev.watches.clone() };

        for appointment in self.source.watched_appointments() {
            let id = appointment.customer_chosen_id;
            let existing = next.watches.get(&id).cloned();

            let state = match existing.as_ref().map(|w| &w.state) {
                Some(ObservationState::Observed { at_block, at_hash }) => {
                    let depth = block.number.saturating_sub(*at_block);
                    if depth > self.max_reorg_limit || self.still_canonical(block, cache, *at_block, *at_hash) {
                        existing.as_ref().unwrap().state.clone()
                    } else {
                        self.observe(block, cache, &appointment)
                    }
                }
                _ => self.observe(block, cache, &appointment),
            };

            let removal_emitted = existing.as_ref().map(|w| w.removal_emitted).unwrap_or(false)
                || next.as_of_block > appointment.end_block + self.max_reorg_limit;

            next.watches.insert(id, AppointmentWatch { end_block: appointment.end_block, state, removal_emitted });
        }

        serde_json::to_value(next).expect("WatcherState always serializes")
    }

    fn detect_changes(&self, prev: &Value, next: &Value) -> Vec<Action> {
        let prev: WatcherState = serde_json::from_value(prev.clone()).unwrap_or_default();
        let next: WatcherState = serde_json::from_value(next.clone()).unwrap_or_default();
        let mut actions = Vec::new();

        for (id, watch) in &next.watches {
            let prior = prev.watches.get(id);

            let was_observed = matches!(prior.map(|w| &w.state), Some(ObservationState::Observed { .. }));
            if !was_observed {
                if let ObservationState::Observed { at_block, .. } = watch.state {
                    actions.push(Action::StartResponse { appointment_id: *id, observed_at_block: at_block });
                }
            }

            let was_removal_emitted = prior.map(|w| w.removal_emitted).unwrap_or(false);
            if watch.removal_emitted && !was_removal_emitted {
                actions.push(Action::RemoveAppointment { appointment_id: *id });
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::{Address, H256, U256};
    use pisa_types::{EventFilter, Mode, ResponsePayload};
    use std::sync::Mutex;

    struct FixedSource(Mutex<Vec<pisa_types::Appointment>>);

    impl AppointmentSource for FixedSource {
        fn watched_appointments(&self) -> Vec<pisa_types::Appointment> {
            self.0.lock().unwrap().clone()
        }
    }

    fn appointment(id: u64, start: u64, end: u64) -> pisa_types::Appointment {
        pisa_types::Appointment {
            customer_address: Address::from_low_u64_be(1),
            customer_chosen_id: H256::from_low_u64_be(id),
            nonce: 0,
            event_filter: EventFilter { address: Address::from_low_u64_be(1), event_signature: H256::from_low_u64_be(9), topics: vec![] },
            payload: ResponsePayload { to: Address::from_low_u64_be(2), calldata: vec![], gas_limit: U256::from(21000), value: U256::zero() },
            start_block: start,
            end_block: end,
            mode: Mode::EventTriggered,
            refund: U256::zero(),
            payment_hash: H256::zero(),
            customer_signature: vec![],
        }
    }

    fn block(n: u64, hash: u8, parent: u8, matching_log: bool) -> Block {
        let logs = if matching_log {
            vec![pisa_types::Log {
                address: Address::from_low_u64_be(1),
                topics: vec![H256::from_low_u64_be(9)],
                data: vec![],
                transaction_hash: H256::zero(),
            }]
        } else {
            vec![]
        };
        Block { hash: H256::from_low_u64_be(hash as u64), parent_hash: H256::from_low_u64_be(parent as u64), number: n, transaction_hashes: vec![], logs, transactions: None }
    }

    #[test]
    fn transitions_to_observed_after_confirmation_depth() {
        let source = Arc::new(FixedSource(Mutex::new(vec![appointment(1, 100, 200)])));
        let watcher = Watcher::new(source, 5, 50);
        let mut cache = BlockCache::new(100, 100);

        cache.add_block(block(100, 1, 0, false));
        cache.add_block(block(101, 2, 1, true));
        for n in 102..108u8 {
            cache.add_block(block(n as u64, n + 1, n, false));
        }

        let state0 = watcher.initial_state(&block(100, 1, 0, false));
        let tip = block(107, 108, 107, false);
        let state1 = watcher.reduce(&state0, &tip, &cache);
        let parsed: WatcherState = serde_json::from_value(state1.clone()).unwrap();
        assert!(matches!(parsed.watches[&H256::from_low_u64_be(1)].state, ObservationState::Observed { .. }));

        let actions = watcher.detect_changes(&state0, &state1);
        assert_eq!(actions, vec![Action::StartResponse { appointment_id: H256::from_low_u64_be(1), observed_at_block: 101 }]);
    }

    #[test]
    fn emits_removal_once_past_window_and_reorg_margin() {
        let source = Arc::new(FixedSource(Mutex::new(vec![appointment(1, 100, 105)])));
        let watcher = Watcher::new(source, 5, 10);
        let mut cache = BlockCache::new(100, 200);
        cache.add_block(block(100, 1, 0, false));

        let state0 = watcher.initial_state(&block(100, 1, 0, false));

        let block_115 = Block { hash: H256::from_low_u64_be(2), parent_hash: H256::from_low_u64_be(1), number: 116, transaction_hashes: vec![], logs: vec![], transactions: None };
        cache.add_block(block_115.clone());
        let state1 = watcher.reduce(&state0, &block_115, &cache);
        let actions = watcher.detect_changes(&state0, &state1);
        assert_eq!(actions, vec![Action::RemoveAppointment { appointment_id: H256::from_low_u64_be(1) }]);

        let block_117 = Block { hash: H256::from_low_u64_be(3), parent_hash: H256::from_low_u64_be(2), number: 117, transaction_hashes: vec![], logs: vec![], transactions: None };
        cache.add_block(block_117.clone());
        let state2 = watcher.reduce(&state1, &block_117, &cache);
        let actions2 = watcher.detect_changes(&state1, &state2);
        assert!(actions2.is_empty(), "removal must only be emitted once");
    }
}
