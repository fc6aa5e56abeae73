//! The key under which a component's per-block snapshot is stored.

use crate::block::BlockHash;
use serde::{Deserialize, Serialize};

/// Per-component, per-block anchor state key: keyed by
/// `(componentName, blockHash)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorKey {
    pub component: &'static str,
    pub block_hash: BlockHash,
}

impl AnchorKey {
    pub fn new(component: &'static str, block_hash: BlockHash) -> Self {
        AnchorKey { component, block_hash }
    }
}
