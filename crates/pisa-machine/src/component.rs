//! The reducer contract every watchtower component implements.

use pisa_blockchain::BlockCache;
use pisa_types::{Action, Block};
use serde_json::Value;

/// A total, pure reducer over anchor state, type-erased to [`serde_json::Value`]
/// so the blockchain machine service can hold heterogeneous components
/// (watcher, responder, …) in one list, the way `ethcore`'s engines are held
/// behind `dyn EthEngine`.
///
/// Implementations must be idempotent — `reduce(reduce(s, b), b) ==
/// reduce(s, b)` — and `detect_changes(a, b)` must depend only on `(a, b)`.
/// Neither method may perform I/O or panic on well-formed input: reducers
/// are total functions.
pub trait Component: Send + Sync {
    /// Name this component's anchor states and actions are filed under.
    fn name(&self) -> &'static str;

    /// Pure function of block content, used the first time this component
    /// sees a given point in the chain (no parent anchor state on record).
    fn initial_state(&self, block: &Block) -> Value;

    /// Folds `block` into the component's view of the chain. Idempotent on
    /// equal `(prev, block)`.
    fn reduce(&self, prev: &Value, block: &Block, cache: &BlockCache) -> Value;

    /// Diffs two anchor states into the actions that transition implies.
    fn detect_changes(&self, prev: &Value, next: &Value) -> Vec<Action>;
}
