use crate::queue::GasQueue;
use ethereum_types::{Address, U256};
use pisa_store::{Store, RESPONDER};
use pisa_types::{AppointmentId, BlockNumber, TransactionIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type Result<T> = std::result::Result<T, pisa_store::Error>;

/// One entry in the multi-responder's live transaction-set: an appointment
/// the responder has accepted and not yet ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSetEntry {
    pub identifier: TransactionIdentifier,
    pub nonce: U256,
    pub observed_at_block: BlockNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueSnapshot {
    items: Vec<pisa_types::GasQueueItem>,
    empty_nonce: U256,
    replacement_rate: u64,
    max_depth: usize,
}

/// Durable view of the multi-responder's gas queue and transaction-set,
/// layered over the store's generic column so the responder crate owns its
/// own on-disk shape without the store crate knowing about it.
pub struct ResponderStore {
    store: Store,
    queue_key: Vec<u8>,
}

impl ResponderStore {
    pub fn new(store: Store, operator_address: Address) -> Self {
        let mut queue_key = b"queue/".to_vec();
        queue_key.extend_from_slice(operator_address.as_bytes());
        ResponderStore { store, queue_key }
    }

    pub fn batch(&self) -> pisa_store::Batch {
        self.store.batch()
    }

    pub fn commit(&self, batch: pisa_store::Batch) -> Result<()> {
        self.store.commit(batch)
    }

    fn tx_key(&self, id: &AppointmentId) -> Vec<u8> {
        let mut key = b"tx/".to_vec();
        key.extend_from_slice(id.as_bytes());
        key
    }

    pub fn load_queue(&self, replacement_rate: u64, max_depth: usize) -> Result<GasQueue> {
        match self.store.get_json::<QueueSnapshot>(RESPONDER, &self.queue_key)? {
            Some(snapshot) => Ok(GasQueue::from_items(snapshot.items, snapshot.empty_nonce, snapshot.replacement_rate, snapshot.max_depth)),
            None => Ok(GasQueue::new(U256::zero(), replacement_rate, max_depth)),
        }
    }

    pub fn put_queue(&self, batch: &mut pisa_store::Batch, queue: &GasQueue) -> Result<()> {
        let snapshot = QueueSnapshot {
            items: queue.items().to_vec(),
            empty_nonce: queue.empty_nonce(),
            replacement_rate: queue.replacement_rate(),
            max_depth: queue.max_depth(),
        };
        self.store.put_json(batch, RESPONDER, &self.queue_key, &snapshot)
    }

    pub fn put_tx(&self, batch: &mut pisa_store::Batch, id: &AppointmentId, entry: &TransactionSetEntry) -> Result<()> {
        self.store.put_json(batch, RESPONDER, &self.tx_key(id), entry)
    }

    pub fn get_tx(&self, id: &AppointmentId) -> Result<Option<TransactionSetEntry>> {
        self.store.get_json(RESPONDER, &self.tx_key(id))
    }

    pub fn remove_tx(&self, batch: &mut pisa_store::Batch, id: &AppointmentId) {
        self.store.delete(batch, RESPONDER, &self.tx_key(id));
    }

    /// Every appointment the responder currently tracks, for reducer seeding.
    pub fn all_tracked(&self) -> Result<BTreeMap<AppointmentId, TransactionSetEntry>> {
        let mut out = BTreeMap::new();
        for (key, value) in self.store.iter_prefix(RESPONDER, b"tx/") {
            let id = AppointmentId::from_slice(&key[3..]);
            let entry: TransactionSetEntry = serde_json::from_slice(&value).map_err(|e| pisa_store::Error::Decode(e.to_string()))?;
            out.insert(id, entry);
        }
        Ok(out)
    }
}
