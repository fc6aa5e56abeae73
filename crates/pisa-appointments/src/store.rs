use ethereum_types::Address;
use log::info;
use pisa_store::{Store, APPOINTMENT};
use pisa_types::{Action, Appointment, AppointmentId, BlockNumber};
use pisa_machine::{ActionDispatcher, DispatchError, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// What `addOrUpdateByLocator` did with an incoming appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Added,
    Updated,
    /// Incoming nonce was not strictly greater than the stored one.
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    appointment: Appointment,
    /// Insertion order, so `getExpiredSince` can honor it without relying on
    /// the store's own key ordering (appointment ids are unordered hashes).
    sequence: u64,
}

fn key(id: &AppointmentId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Keyed by `customerChosenId`. Every mutation is persisted through the
/// shared store's `APPOINTMENT` column; an in-memory mirror avoids a full
/// column scan on every read.
pub struct AppointmentStore {
    store: Store,
    records: Mutex<BTreeMap<AppointmentId, Record>>,
    next_sequence: Mutex<u64>,
}

impl AppointmentStore {
    /// Loads the in-memory mirror from the durable column.
    pub fn open(store: Store) -> Result<Self, pisa_store::Error> {
        let mut records = BTreeMap::new();
        let mut max_sequence = 0u64;
        for (k, v) in store.iter_prefix(APPOINTMENT, b"") {
            if k.len() != 32 {
                continue;
            }
            let id = AppointmentId::from_slice(&k);
            let record: Record = serde_json::from_slice(&v).map_err(|e| pisa_store::Error::Decode(e.to_string()))?;
            max_sequence = max_sequence.max(record.sequence);
            records.insert(id, record);
        }
        Ok(AppointmentStore { store, records: Mutex::new(records), next_sequence: Mutex::new(max_sequence + 1) })
    }

    pub fn get(&self, id: &AppointmentId) -> Option<Appointment> {
        self.records.lock().unwrap().get(id).map(|r| r.appointment.clone())
    }

    /// Reject if the stored nonce is strictly greater; overwrite if the
    /// incoming nonce is strictly greater; no-op (idempotent replay) on a tie.
    pub fn add_or_update_by_locator(&self, appointment: Appointment) -> Result<UpdateOutcome, pisa_store::Error> {
        let mut records = self.records.lock().unwrap();
        let id = appointment.customer_chosen_id;

        let outcome = match records.get(&id) {
            Some(existing) if existing.appointment.nonce >= appointment.nonce => UpdateOutcome::Rejected,
            Some(_) => UpdateOutcome::Updated,
            None => UpdateOutcome::Added,
        };

        if outcome == UpdateOutcome::Rejected {
            return Ok(outcome);
        }

        let sequence = match records.get(&id) {
            Some(existing) => existing.sequence,
            None => {
                let mut next = self.next_sequence.lock().unwrap();
                let s = *next;
                *next += 1;
                s
            }
        };

        let record = Record { appointment, sequence };
        let mut batch = self.store.batch();
        self.store.put_json(&mut batch, APPOINTMENT, &key(&id), &record)?;
        self.store.commit(batch)?;
        records.insert(id, record);
        Ok(outcome)
    }

    /// Returns whether a record was actually removed.
    pub fn remove_by_id(&self, id: &AppointmentId) -> Result<bool, pisa_store::Error> {
        let mut records = self.records.lock().unwrap();
        if records.remove(id).is_none() {
            return Ok(false);
        }
        let mut batch = self.store.batch();
        self.store.delete(&mut batch, APPOINTMENT, &key(id));
        self.store.commit(batch)?;
        Ok(true)
    }

    /// Appointments with `endBlock < blockNumber`, in insertion order. A
    /// one-shot snapshot: call again for a fresh view, there is no way to
    /// resume a partially-consumed one.
    pub fn expired_since(&self, block_number: BlockNumber) -> ExpiredAppointments {
        let mut matching: Vec<Record> = self.records.lock().unwrap().values().filter(|r| r.appointment.end_block < block_number).cloned().collect();
        matching.sort_by_key(|r| r.sequence);
        ExpiredAppointments { items: matching.into_iter().map(|r| r.appointment).collect(), cursor: 0 }
    }

    pub fn by_customer_address(&self, address: Address) -> Vec<Appointment> {
        self.records.lock().unwrap().values().filter(|r| r.appointment.customer_address == address).map(|r| r.appointment.clone()).collect()
    }
}

/// A one-shot, in-order iterator produced by [`AppointmentStore::expired_since`].
pub struct ExpiredAppointments {
    items: Vec<Appointment>,
    cursor: usize,
}

impl Iterator for ExpiredAppointments {
    type Item = Appointment;

    fn next(&mut self) -> Option<Appointment> {
        let item = self.items.get(self.cursor).cloned();
        self.cursor += 1;
        item
    }
}

impl pisa_watcher::AppointmentSource for AppointmentStore {
    fn watched_appointments(&self) -> Vec<Appointment> {
        self.records.lock().unwrap().values().map(|r| r.appointment.clone()).collect()
    }
}

impl pisa_responder::AppointmentLookup for AppointmentStore {
    fn get(&self, id: &AppointmentId) -> Option<Appointment> {
        AppointmentStore::get(self, id)
    }
}

impl AppointmentStore {
    /// Retires an appointment once the watcher declares its window closed.
    /// A `&self` method, not just [`ActionDispatcher`], so a caller sharing
    /// this store via `Arc` (with a [`pisa_watcher::AppointmentSource`] or
    /// [`pisa_responder::AppointmentLookup`] registration) can dispatch
    /// without needing exclusive ownership.
    pub fn dispatch(&self, action: &Action) -> Result<Outcome, DispatchError> {
        match action {
            Action::RemoveAppointment { appointment_id } => {
                let removed = self.remove_by_id(appointment_id).map_err(|e| DispatchError(e.to_string()))?;
                info!(target: "appointments", "removed {appointment_id:?}: {removed}");
                Ok(Outcome::Handled)
            }
            _ => Ok(Outcome::NotApplicable),
        }
    }
}

impl ActionDispatcher for AppointmentStore {
    fn handle(&mut self, action: &Action) -> Result<Outcome, DispatchError> {
        self.dispatch(action)
    }
}
