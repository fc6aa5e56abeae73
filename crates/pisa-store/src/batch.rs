//! One atomic write, covering every family touched while processing a
//! single block. Batches never nest.

use kvdb::DBTransaction;

#[derive(Default)]
pub struct Batch {
    transaction: DBTransaction,
}

impl Batch {
    pub fn new() -> Self {
        Batch { transaction: DBTransaction::new() }
    }

    pub fn put(&mut self, col: u32, key: Vec<u8>, value: Vec<u8>) {
        self.transaction.put(Some(col), &key, &value);
    }

    pub fn delete(&mut self, col: u32, key: Vec<u8>) {
        self.transaction.delete(Some(col), &key);
    }

    pub(crate) fn into_transaction(self) -> DBTransaction {
        self.transaction
    }
}
