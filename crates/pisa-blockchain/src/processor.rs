//! Linearizes the canonical chain from a noisy node API.

use crate::cache::BlockCache;
use crate::error::DeepReorg;
use log::{debug, warn};
use pisa_node::NodeClient;
use pisa_types::Block;

/// Receives newly-attached blocks from the processor, in topological order,
/// and commits whatever per-block side effects it owns (anchor states,
/// actions, head advance) atomically before the processor moves on to the
/// next block. Implemented by the blockchain machine service.
pub trait BlockSink {
    type Error: std::fmt::Display;

    /// `cache` is the processor's view of the chain *after* `block` has
    /// been attached, so reducers can walk `cache.ancestry(block.hash)` for
    /// confirmation-depth checks.
    fn commit_block(&mut self, block: Block, cache: &BlockCache) -> Result<(), Self::Error>;

    /// Called for every block hash the cache evicts by pruning, so the sink
    /// can drop the matching anchor states.
    fn evict_block(&mut self, hash: pisa_types::BlockHash) -> Result<(), Self::Error>;
}

/// Errors from a single `poll` cycle.
#[derive(Debug)]
pub enum Error<E> {
    Node(pisa_node::NodeError),
    DeepReorg(DeepReorg),
    Sink(E),
}

impl<E: std::fmt::Display> std::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Node(e) => write!(f, "{e}"),
            Error::DeepReorg(e) => write!(f, "{e}"),
            Error::Sink(e) => write!(f, "block sink error: {e}"),
        }
    }
}

/// Polls a [`NodeClient`] for the chain tip, fetches missing ancestors, and
/// hands newly-attached blocks to a [`BlockSink`] in topological order.
pub struct BlockProcessor<N> {
    node: N,
    cache: BlockCache,
}

impl<N: NodeClient> BlockProcessor<N> {
    pub fn new(node: N, cache: BlockCache) -> Self {
        BlockProcessor { node, cache }
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut BlockCache {
        &mut self.cache
    }

    /// One poll cycle: fetch the node's tip, walk back to an attached
    /// ancestor (aborting with [`DeepReorg`] if that walk exceeds the
    /// cache's `max_depth`), then commit every newly-attached block in
    /// topological order via `sink`.
    pub fn poll<S: BlockSink>(&mut self, sink: &mut S) -> Result<(), Error<S::Error>> {
        let tip_number = self.node.get_block_number().map_err(Error::Node)?;
        let head_number = self
            .cache
            .head()
            .map(|h| self.cache.get(&h).number)
            .unwrap_or(self.cache.min_height());

        if tip_number <= head_number && self.cache.head().is_some() {
            return Ok(());
        }

        let tip = self
            .node
            .get_block_by_number(tip_number, false)
            .map_err(Error::Node)?
            .ok_or_else(|| Error::Node(pisa_node::NodeError::new("node reports a tip it cannot serve")))?;

        let chain = self.walk_to_attached(tip)?;

        for block in chain {
            let hash = block.hash;
            self.cache.add_block(block.clone());
            sink.commit_block(block, &self.cache).map_err(Error::Sink)?;
            self.cache.set_head(hash);
            for evicted in self.cache.take_pruned() {
                sink.evict_block(evicted).map_err(Error::Sink)?;
            }
            debug!(target: "blockchain", "committed block {hash:?} at head");
        }

        Ok(())
    }

    /// Walks backward from `tip` fetching ancestors until one is already
    /// attached in the cache, returning the walked chain in topological
    /// (oldest-first) order. Fails with [`DeepReorg`] if the walk exceeds
    /// `max_depth` without meeting an attached block.
    fn walk_to_attached<E>(&self, tip: Block) -> Result<Vec<Block>, Error<E>> {
        let max_depth = self.cache.max_height().saturating_sub(self.cache.min_height()).max(1);
        let mut chain = vec![tip];

        loop {
            let earliest = chain.last().expect("chain is never empty");
            if self.cache.is_attached(&earliest.hash) || self.cache.try_get(&earliest.parent_hash).is_some() {
                break;
            }
            if (chain.len() as u64) > max_depth {
                warn!(target: "blockchain", "deep reorg: walked {} blocks without meeting an attached ancestor", chain.len());
                return Err(Error::DeepReorg(DeepReorg { walked: chain.len() as u64, max_depth }));
            }

            let parent_hash = earliest.parent_hash;
            let parent = self
                .node
                .get_block_by_hash(parent_hash)
                .map_err(Error::Node)?
                .ok_or_else(|| Error::Node(pisa_node::NodeError::new("missing ancestor block")))?;
            chain.push(parent);
        }

        chain.reverse();
        Ok(chain)
    }
}
