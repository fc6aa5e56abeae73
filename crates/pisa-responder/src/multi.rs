use crate::component::{TrackedEntry, TrackedSource};
use crate::queue::GasQueue;
use crate::store::{ResponderStore, TransactionSetEntry};
use ethereum_types::{Address, U256};
use log::{info, warn};
use pisa_machine::{ActionDispatcher, DispatchError};
use pisa_types::{Action, Appointment, BlockNumber, GasQueueRequest};
use std::sync::Mutex;

/// Estimates a gas price to pay for a new broadcast and reports the
/// operator's current balance, backed by a node RPC client in production.
pub trait BalanceProvider: Send + Sync {
    fn estimate_gas_price(&self) -> Result<U256, String>;
    fn balance_of(&self, address: Address) -> Result<U256, String>;
}

/// Signs and submits a raw transaction for one gas queue item.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, item: &pisa_types::GasQueueItem) -> Result<(), String>;
}

/// Owns the operator signing key's gas queue and transaction-set. All
/// operations run under one internal lock: the block-processor drives them
/// serially, but the lock also protects against a dispatch racing a replay.
pub struct MultiResponder {
    store: ResponderStore,
    balances: std::sync::Arc<dyn BalanceProvider>,
    broadcaster: std::sync::Arc<dyn Broadcaster>,
    operator_address: Address,
    chain_id: u64,
    replacement_rate: u64,
    max_depth: usize,
    low_balance_threshold: U256,
    queue: Mutex<GasQueue>,
}

impl MultiResponder {
    pub fn new(
        store: ResponderStore,
        balances: std::sync::Arc<dyn BalanceProvider>,
        broadcaster: std::sync::Arc<dyn Broadcaster>,
        operator_address: Address,
        chain_id: u64,
        replacement_rate: u64,
        max_depth: usize,
        low_balance_threshold: U256,
    ) -> Result<Self, pisa_store::Error> {
        let queue = store.load_queue(replacement_rate, max_depth)?;
        Ok(MultiResponder {
            store,
            balances,
            broadcaster,
            operator_address,
            chain_id,
            replacement_rate,
            max_depth,
            low_balance_threshold,
            queue: Mutex::new(queue),
        })
    }

    fn broadcast_diff(&self, old: &GasQueue, new: &GasQueue) {
        for item in new.difference(old) {
            if let Err(e) = self.broadcaster.broadcast(&item) {
                warn!(target: "responder", "broadcast failed for nonce {}: {e}", item.nonce);
            }
        }
    }

    fn start_response(&self, appointment: &Appointment, observed_at_block: BlockNumber) -> Result<(), DispatchError> {
        let gas_price = self.balances.estimate_gas_price().map_err(DispatchError)?;
        let identifier = appointment.payload.identifier(self.chain_id);
        let request = GasQueueRequest { identifier: identifier.clone(), appointment_id: appointment.customer_chosen_id, gas_limit: appointment.payload.gas_limit };

        let mut queue = self.queue.lock().unwrap();
        let new_queue = match queue.add(request, gas_price) {
            Ok(q) => q,
            Err(e) => {
                warn!(target: "responder", "gas queue rejected appointment {:?}: {e}", appointment.customer_chosen_id);
                return Ok(());
            }
        };

        let nonce = new_queue
            .items()
            .iter()
            .find(|i| i.identifier() == &identifier)
            .map(|i| i.nonce)
            .unwrap_or_default();

        let entry = TransactionSetEntry { identifier, nonce, observed_at_block };
        let mut batch = self.store.batch();
        self.store.put_queue(&mut batch, &new_queue).map_err(|e| DispatchError(e.to_string()))?;
        self.store.put_tx(&mut batch, &appointment.customer_chosen_id, &entry).map_err(|e| DispatchError(e.to_string()))?;
        self.store.commit(batch).map_err(|e| DispatchError(e.to_string()))?;

        self.broadcast_diff(&queue, &new_queue);
        *queue = new_queue;
        Ok(())
    }

    fn tx_mined(&self, identifier: &pisa_types::TransactionIdentifier, nonce: U256) -> Result<(), DispatchError> {
        let mut queue = self.queue.lock().unwrap();
        let new_queue = queue.consume(identifier, nonce);
        let mut batch = self.store.batch();
        self.store.put_queue(&mut batch, &new_queue).map_err(|e| DispatchError(e.to_string()))?;
        self.store.commit(batch).map_err(|e| DispatchError(e.to_string()))?;
        *queue = new_queue;
        Ok(())
    }

    fn check_responder_balance(&self) -> Result<(), DispatchError> {
        match self.balances.balance_of(self.operator_address) {
            Ok(balance) if balance < self.low_balance_threshold => {
                warn!(target: "responder", "operator balance {balance} below threshold {}", self.low_balance_threshold);
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(target: "responder", "balance check failed: {e}");
                Ok(())
            }
        }
    }

    fn re_enqueue_missing(&self, appointment_ids: &[pisa_types::AppointmentId]) -> Result<(), DispatchError> {
        let gas_price = self.balances.estimate_gas_price().map_err(DispatchError)?;
        let mut queue = self.queue.lock().unwrap();

        for id in appointment_ids {
            let entry = self
                .store
                .get_tx(id)
                .map_err(|e| DispatchError(e.to_string()))?
                .ok_or_else(|| DispatchError(format!("re-enqueue of unknown appointment {id:?}")))?;

            let request = GasQueueRequest { identifier: entry.identifier.clone(), appointment_id: *id, gas_limit: U256::zero() };
            let new_queue = match queue.add(request, gas_price) {
                Ok(q) => q,
                Err(e) => {
                    warn!(target: "responder", "re-enqueue rejected for {id:?}: {e}");
                    continue;
                }
            };

            let nonce = new_queue.items().iter().find(|i| i.identifier() == &entry.identifier).map(|i| i.nonce).unwrap_or_default();
            let mut batch = self.store.batch();
            self.store.put_queue(&mut batch, &new_queue).map_err(|e| DispatchError(e.to_string()))?;
            self.store
                .put_tx(&mut batch, id, &TransactionSetEntry { identifier: entry.identifier, nonce, observed_at_block: entry.observed_at_block })
                .map_err(|e| DispatchError(e.to_string()))?;
            self.store.commit(batch).map_err(|e| DispatchError(e.to_string()))?;

            self.broadcast_diff(&queue, &new_queue);
            *queue = new_queue;
        }
        Ok(())
    }

    fn end_response(&self, appointment_id: &pisa_types::AppointmentId) -> Result<(), DispatchError> {
        let mut batch = self.store.batch();
        self.store.remove_tx(&mut batch, appointment_id);
        self.store.commit(batch).map_err(|e| DispatchError(e.to_string()))?;
        info!(target: "responder", "ended response for {appointment_id:?}");
        Ok(())
    }
}

impl TrackedSource for MultiResponder {
    fn tracked(&self) -> Vec<TrackedEntry> {
        self.store
            .all_tracked()
            .unwrap_or_default()
            .into_iter()
            .map(|(appointment_id, entry)| TrackedEntry { appointment_id, identifier: entry.identifier, nonce: entry.nonce, observed_at_block: entry.observed_at_block })
            .collect()
    }
}

impl MultiResponder {
    /// The multi-responder handles every responder-facing action kind;
    /// unrelated actions (watcher's `RemoveAppointment`, appointment-store
    /// actions) are left for the next dispatcher in line to accept. Exposed
    /// as a `&self` method, not just through [`ActionDispatcher`], so a
    /// caller holding an `Arc<MultiResponder>` (shared with a [`TrackedSource`]
    /// registration) can dispatch without needing exclusive ownership.
    pub fn dispatch(&self, action: &Action) -> Result<pisa_machine::Outcome, DispatchError> {
        use pisa_machine::Outcome;
        match action {
            Action::TxMined { identifier, nonce } => self.tx_mined(identifier, *nonce).map(|_| Outcome::Handled),
            Action::CheckResponderBalance => self.check_responder_balance().map(|_| Outcome::Handled),
            Action::ReEnqueueMissingItems { appointment_ids } => self.re_enqueue_missing(appointment_ids).map(|_| Outcome::Handled),
            Action::EndResponse { appointment_id } => self.end_response(appointment_id).map(|_| Outcome::Handled),
            Action::StuckTx { appointment_id, .. } => self.re_enqueue_missing(std::slice::from_ref(appointment_id)).map(|_| Outcome::Handled),
            Action::StartResponse { .. } | Action::RemoveAppointment { .. } => Ok(Outcome::NotApplicable),
        }
    }
}

impl ActionDispatcher for MultiResponder {
    fn handle(&mut self, action: &Action) -> Result<pisa_machine::Outcome, DispatchError> {
        self.dispatch(action)
    }
}

impl MultiResponder {
    /// Entry point for the appointment-intake path once an appointment's
    /// event has been observed (`StartResponse`), kept separate from
    /// `ActionDispatcher::handle` because it needs the full `Appointment`,
    /// not just its id.
    pub fn accept(&self, appointment: &Appointment, observed_at_block: BlockNumber) -> Result<(), DispatchError> {
        self.start_response(appointment, observed_at_block)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn replacement_rate(&self) -> u64 {
        self.replacement_rate
    }
}

/// Resolves an appointment id back to its full, signed record. Implemented
/// by the appointment store.
pub trait AppointmentLookup: Send + Sync {
    fn get(&self, id: &pisa_types::AppointmentId) -> Option<Appointment>;
}

/// Bridges the watcher's `StartResponse(appointmentId)` action to
/// [`MultiResponder::accept`], which needs the full appointment record.
pub struct StartResponseDispatcher<L> {
    responder: std::sync::Arc<MultiResponder>,
    lookup: std::sync::Arc<L>,
}

impl<L: AppointmentLookup> StartResponseDispatcher<L> {
    pub fn new(responder: std::sync::Arc<MultiResponder>, lookup: std::sync::Arc<L>) -> Self {
        StartResponseDispatcher { responder, lookup }
    }
}

impl<L: AppointmentLookup> ActionDispatcher for StartResponseDispatcher<L> {
    fn handle(&mut self, action: &Action) -> Result<pisa_machine::Outcome, DispatchError> {
        use pisa_machine::Outcome;
        match action {
            Action::StartResponse { appointment_id, observed_at_block } => {
                let appointment = self
                    .lookup
                    .get(appointment_id)
                    .ok_or_else(|| DispatchError(format!("unknown appointment {appointment_id:?}")))?;
                self.responder.accept(&appointment, *observed_at_block).map(|_| Outcome::Handled)
            }
            _ => Ok(Outcome::NotApplicable),
        }
    }
}
