//! Bounded in-memory window of recent blocks.

use crate::error::Error;
use pisa_types::{Block, BlockHash, BlockNumber};
use std::collections::{HashMap, HashSet};

/// Outcome of [`BlockCache::add_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// The block is attached (its parent chain reaches bootstrap height).
    Added,
    /// The block's parent is not attached yet; it waits in the orphan pool.
    AddedDetached,
    /// The block was already known; nothing changed.
    NotAdded,
}

/// A bounded window of recent blocks with attach/detach tracking, ancestry
/// traversal and an explicit head pointer.
pub struct BlockCache {
    max_depth: u64,
    initial_height: BlockNumber,
    max_height: BlockNumber,
    blocks: HashMap<BlockHash, Block>,
    attached: HashSet<BlockHash>,
    /// parent hash -> detached children waiting on it.
    waiting: HashMap<BlockHash, Vec<BlockHash>>,
    head: Option<BlockHash>,
    /// Hashes pruned since the caller last drained them, so it can evict
    /// the matching anchor states once a block leaves the cache.
    pruned: Vec<BlockHash>,
}

impl BlockCache {
    pub fn new(initial_height: BlockNumber, max_depth: u64) -> Self {
        BlockCache {
            max_depth,
            initial_height,
            max_height: initial_height,
            blocks: HashMap::new(),
            attached: HashSet::new(),
            waiting: HashMap::new(),
            head: None,
            pruned: Vec::new(),
        }
    }

    /// `minHeight = max(initialHeight, maxHeight - maxDepth)`.
    pub fn min_height(&self) -> BlockNumber {
        self.initial_height.max(self.max_height.saturating_sub(self.max_depth))
    }

    pub fn max_height(&self) -> BlockNumber {
        self.max_height
    }

    pub fn head(&self) -> Option<BlockHash> {
        self.head
    }

    pub fn is_attached(&self, hash: &BlockHash) -> bool {
        self.attached.contains(hash)
    }

    /// `canAttachBlock(b)`: true iff `b.number <= minHeight` (a bootstrap
    /// block) or its parent is attached.
    pub fn can_attach(&self, block: &Block) -> bool {
        block.number <= self.min_height() || self.attached.contains(&block.parent_hash)
    }

    /// Inserts a block, attaching it (and any waiting descendants, in a
    /// single sweep) if possible.
    pub fn add_block(&mut self, block: Block) -> AddResult {
        if self.blocks.contains_key(&block.hash) {
            return AddResult::NotAdded;
        }

        let hash = block.hash;
        let parent_hash = block.parent_hash;
        let attachable = self.can_attach(&block);
        self.blocks.insert(hash, block);

        if attachable {
            self.attach(hash);
            self.sweep_waiting(hash);
            self.prune();
            AddResult::Added
        } else {
            self.waiting.entry(parent_hash).or_default().push(hash);
            AddResult::AddedDetached
        }
    }

    fn attach(&mut self, hash: BlockHash) {
        self.attached.insert(hash);
        if let Some(block) = self.blocks.get(&hash) {
            self.max_height = self.max_height.max(block.number);
        }
    }

    /// Transitions every previously-detached descendant of `hash` to Added,
    /// without re-invoking `add_block`.
    fn sweep_waiting(&mut self, hash: BlockHash) {
        let mut frontier = vec![hash];
        while let Some(parent) = frontier.pop() {
            if let Some(children) = self.waiting.remove(&parent) {
                for child in children {
                    self.attach(child);
                    frontier.push(child);
                }
            }
        }
    }

    /// Evicts attached blocks (and their waiting subtrees, which can never
    /// attach now) with `number < minHeight`.
    fn prune(&mut self) {
        let min_height = self.min_height();
        let stale: Vec<BlockHash> = self
            .attached
            .iter()
            .copied()
            .filter(|h| self.blocks.get(h).map(|b| b.number < min_height).unwrap_or(false))
            .collect();

        for hash in stale {
            self.attached.remove(&hash);
            self.blocks.remove(&hash);
            self.waiting.remove(&hash);
            self.pruned.push(hash);
        }
    }

    /// Drains the set of hashes evicted by pruning since the last call.
    pub fn take_pruned(&mut self) -> Vec<BlockHash> {
        std::mem::take(&mut self.pruned)
    }

    pub fn get(&self, hash: &BlockHash) -> &Block {
        self.blocks.get(hash).unwrap_or_else(|| panic!("block cache: unknown hash {hash:?}"))
    }

    pub fn try_get(&self, hash: &BlockHash) -> Option<&Block> {
        self.blocks.get(hash)
    }

    /// Sets the head to `hash`. Panics if `hash` is not attached: a
    /// programmer error.
    pub fn set_head(&mut self, hash: BlockHash) {
        if !self.attached.contains(&hash) {
            panic!("{}", Error::NotAttached(hash));
        }
        self.head = Some(hash);
    }

    /// Walks parent pointers from `hash` until the cache boundary, inclusive
    /// of `hash` itself.
    pub fn ancestry<'a>(&'a self, hash: BlockHash) -> Ancestry<'a> {
        Ancestry { cache: self, next: Some(hash) }
    }

    /// Nearest ancestor of `hash` (inclusive) satisfying `pred`, at height
    /// `>= min_height`.
    pub fn find_ancestor<P>(&self, hash: BlockHash, min_height: BlockNumber, mut pred: P) -> Option<BlockHash>
    where
        P: FnMut(&Block) -> bool,
    {
        for ancestor_hash in self.ancestry(hash) {
            let block = self.get(&ancestor_hash);
            if block.number < min_height {
                break;
            }
            if pred(block) {
                return Some(ancestor_hash);
            }
        }
        None
    }
}

/// Iterator walking a block's ancestry, produced by [`BlockCache::ancestry`].
pub struct Ancestry<'a> {
    cache: &'a BlockCache,
    next: Option<BlockHash>,
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = BlockHash;

    fn next(&mut self) -> Option<BlockHash> {
        let current = self.next?;
        let block = self.cache.try_get(&current)?;
        self.next = self.cache.try_get(&block.parent_hash).map(|_| block.parent_hash);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::H256;

    fn block(n: u64, hash: u8, parent: u8) -> Block {
        Block {
            hash: H256::from_low_u64_be(hash as u64),
            parent_hash: H256::from_low_u64_be(parent as u64),
            number: n,
            transaction_hashes: vec![],
            logs: vec![],
            transactions: None,
        }
    }

    #[test]
    fn bootstrap_block_attaches_directly() {
        let mut cache = BlockCache::new(0, 10);
        let result = cache.add_block(block(0, 1, 0));
        assert_eq!(result, AddResult::Added);
        assert!(cache.is_attached(&H256::from_low_u64_be(1)));
    }

    #[test]
    fn detached_child_attaches_on_parent_arrival() {
        let mut cache = BlockCache::new(0, 10);
        cache.add_block(block(0, 1, 0));
        let child = H256::from_low_u64_be(2);
        let grandchild = H256::from_low_u64_be(3);

        let result = cache.add_block(block(2, 3, 2));
        assert_eq!(result, AddResult::AddedDetached);
        assert!(!cache.is_attached(&grandchild));

        let result = cache.add_block(block(1, 2, 1));
        assert_eq!(result, AddResult::Added);
        assert!(cache.is_attached(&child));
        assert!(cache.is_attached(&grandchild), "grandchild should attach in the same sweep");
    }

    #[test]
    fn duplicate_add_is_not_added() {
        let mut cache = BlockCache::new(0, 10);
        cache.add_block(block(0, 1, 0));
        assert_eq!(cache.add_block(block(0, 1, 0)), AddResult::NotAdded);
    }

    #[test]
    fn pruning_evicts_blocks_below_min_height() {
        let mut cache = BlockCache::new(0, 2);
        cache.add_block(block(0, 1, 0));
        cache.add_block(block(1, 2, 1));
        cache.add_block(block(2, 3, 2));
        assert!(cache.is_attached(&H256::from_low_u64_be(1)));

        cache.add_block(block(3, 4, 3));
        // min_height = max(0, 3 - 2) = 1, so block at height 0 is pruned.
        assert!(!cache.is_attached(&H256::from_low_u64_be(1)));
        assert_eq!(cache.take_pruned(), vec![H256::from_low_u64_be(1)]);
    }

    #[test]
    #[should_panic]
    fn set_head_on_unattached_hash_panics() {
        let mut cache = BlockCache::new(0, 10);
        cache.set_head(H256::from_low_u64_be(99));
    }

    #[test]
    fn ancestry_and_find_ancestor() {
        let mut cache = BlockCache::new(0, 10);
        cache.add_block(block(0, 1, 0));
        cache.add_block(block(1, 2, 1));
        cache.add_block(block(2, 3, 2));

        let chain: Vec<_> = cache.ancestry(H256::from_low_u64_be(3)).collect();
        assert_eq!(
            chain,
            vec![H256::from_low_u64_be(3), H256::from_low_u64_be(2), H256::from_low_u64_be(1)]
        );

        let found = cache.find_ancestor(H256::from_low_u64_be(3), 0, |b| b.number == 1);
        assert_eq!(found, Some(H256::from_low_u64_be(2)));
    }
}
