// This file is part of the PISA watchtower core.

//! Durable key/value persistence, layered over `kvdb`.
//!
//! One database, five columns, one logical namespace:
//! `block/<hash>`, `anchor/<component>/<blockHash>`, `action/<uuid>`, and a
//! generic column for responder/appointment records (`queue/<addr>`,
//! `tx/<id>`, `appointment/<id>`). Every write to the block/anchor/action
//! families for a given block goes through a single [`Batch`], committed
//! atomically so a restart never observes a partial write.

mod batch;
mod columns;
mod error;

pub use batch::Batch;
pub use columns::{ACTION, ANCHOR, APPOINTMENT, BLOCK, NUM_COLUMNS, RESPONDER};
pub use error::Error;

use kvdb::KeyValueDB;
use pisa_types::{Action, ActionId, AnchorKey, Block, BlockHash};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Opens an in-memory store, used by every crate's test suite in place of
/// spinning up RocksDB (mirrors `kvdb-memorydb` use across `ethcore`).
pub fn open_memory() -> Store {
    Store { db: Arc::new(kvdb_memorydb::create(NUM_COLUMNS)) }
}

/// Opens a RocksDB-backed store at `path`.
pub fn open_rocksdb(path: &str) -> Result<Store, Error> {
    let config = kvdb_rocksdb::DatabaseConfig::with_columns(Some(NUM_COLUMNS));
    let db = kvdb_rocksdb::Database::open(&config, path).map_err(|e| Error::Backend(e.to_string()))?;
    Ok(Store { db: Arc::new(db) })
}

/// Handle to the watchtower's single key/value namespace.
#[derive(Clone)]
pub struct Store {
    db: Arc<dyn KeyValueDB>,
}

fn block_key(hash: &BlockHash) -> Vec<u8> {
    hash.as_bytes().to_vec()
}

fn anchor_key(key: &AnchorKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.component.len() + 1 + 32);
    out.extend_from_slice(key.component.as_bytes());
    out.push(b'/');
    out.extend_from_slice(key.block_hash.as_bytes());
    out
}

fn action_key(id: &ActionId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Reserved key in the block family for the last-committed head, distinct
/// in length from any real block hash key (32 bytes) so it can never collide.
const HEAD_KEY: &[u8] = b"HEAD";

impl Store {
    /// Starts a new atomic write batch.
    pub fn batch(&self) -> Batch {
        Batch::new()
    }

    /// Commits a batch. This is the single suspension/failure point for a
    /// block's worth of writes.
    pub fn commit(&self, batch: Batch) -> Result<(), Error> {
        self.db.write(batch.into_transaction()).map_err(|e| Error::Backend(e.to_string()))
    }

    // -- block family --------------------------------------------------

    pub fn put_block(&self, batch: &mut Batch, block: &Block) -> Result<(), Error> {
        let bytes = serde_json::to_vec(block).map_err(|e| Error::Decode(e.to_string()))?;
        batch.put(BLOCK, block_key(&block.hash), bytes);
        Ok(())
    }

    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>, Error> {
        self.get_json(BLOCK, &block_key(hash))
    }

    pub fn delete_block(&self, batch: &mut Batch, hash: &BlockHash) {
        batch.delete(BLOCK, block_key(hash));
    }

    /// Records `hash` as the last-committed head, so a restart can bootstrap
    /// a fresh block cache from it instead of the node's current tip.
    pub fn put_head(&self, batch: &mut Batch, hash: &BlockHash) {
        batch.put(BLOCK, HEAD_KEY.to_vec(), hash.as_bytes().to_vec());
    }

    pub fn get_head(&self) -> Result<Option<BlockHash>, Error> {
        match self.db.get(Some(BLOCK), HEAD_KEY).map_err(|e| Error::Backend(e.to_string()))? {
            Some(bytes) => Ok(Some(BlockHash::from_slice(&bytes))),
            None => Ok(None),
        }
    }

    // -- anchor family ---------------------------------------------------

    pub fn put_anchor<T: Serialize>(&self, batch: &mut Batch, key: &AnchorKey, state: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(state).map_err(|e| Error::Decode(e.to_string()))?;
        batch.put(ANCHOR, anchor_key(key), bytes);
        Ok(())
    }

    pub fn get_anchor<T: DeserializeOwned>(&self, key: &AnchorKey) -> Result<Option<T>, Error> {
        self.get_json(ANCHOR, &anchor_key(key))
    }

    pub fn delete_anchor(&self, batch: &mut Batch, key: &AnchorKey) {
        batch.delete(ANCHOR, anchor_key(key));
    }

    // -- action family ---------------------------------------------------

    pub fn put_action(&self, batch: &mut Batch, id: &ActionId, action: &Action) -> Result<(), Error> {
        let bytes = serde_json::to_vec(action).map_err(|e| Error::Decode(e.to_string()))?;
        batch.put(ACTION, action_key(id), bytes);
        Ok(())
    }

    pub fn delete_action(&self, batch: &mut Batch, id: &ActionId) {
        batch.delete(ACTION, action_key(id));
    }

    /// Every undispatched action, for replay on startup.
    pub fn list_actions(&self) -> Result<Vec<(ActionId, Action)>, Error> {
        let mut out = Vec::new();
        for (key, value) in self.db.iter(Some(ACTION)) {
            let id = ActionId::from_slice(&key).map_err(|e| Error::Decode(e.to_string()))?;
            let action: Action = serde_json::from_slice(&value).map_err(|e| Error::Decode(e.to_string()))?;
            out.push((id, action));
        }
        Ok(out)
    }

    // -- generic helpers for the responder/appointment domain stores -----

    pub fn put_json<T: Serialize>(&self, batch: &mut Batch, col: u32, key: &[u8], value: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value).map_err(|e| Error::Decode(e.to_string()))?;
        batch.put(col, key.to_vec(), bytes);
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, col: u32, key: &[u8]) -> Result<Option<T>, Error> {
        match self.db.get(Some(col), key).map_err(|e| Error::Backend(e.to_string()))? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn delete(&self, batch: &mut Batch, col: u32, key: &[u8]) {
        batch.delete(col, key.to_vec());
    }

    /// Every record in `col` whose key starts with `prefix`.
    pub fn iter_prefix(&self, col: u32, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.db
            .iter_from_prefix(Some(col), prefix)
            .map(|(k, v)| (k.into_vec(), v.into_vec()))
            .collect()
    }
}
