//! Drives reducers and dispatches actions atomically with block commit.

use crate::component::Component;
use crate::dispatch::ActionDispatcher;
use crate::error::Error;
use log::{info, warn};
use pisa_blockchain::BlockCache;
use pisa_store::Store;
use pisa_types::{Action, AnchorKey, Block, BlockHash};
use uuid::Uuid;

/// Composes the registered components with the durable store, implementing
/// [`pisa_blockchain::BlockSink`] so a [`pisa_blockchain::BlockProcessor`]
/// can drive it directly.
pub struct BlockchainMachine {
    store: Store,
    components: Vec<Box<dyn Component>>,
    dispatchers: Vec<Box<dyn ActionDispatcher>>,
}

impl BlockchainMachine {
    pub fn new(store: Store) -> Self {
        BlockchainMachine { store, components: Vec::new(), dispatchers: Vec::new() }
    }

    pub fn register_component(&mut self, component: Box<dyn Component>) {
        self.components.push(component);
    }

    pub fn register_dispatcher(&mut self, dispatcher: Box<dyn ActionDispatcher>) {
        self.dispatchers.push(dispatcher);
    }

    /// Replays every persisted-but-undispatched action on startup. Must run
    /// before the service starts taking new blocks.
    pub fn replay_undispatched(&mut self) -> Result<(), Error> {
        let mut pending = self.store.list_actions()?;
        pending.sort_by_key(|(_, action)| action.component_order());
        info!(target: "machine", "replaying {} undispatched action(s)", pending.len());
        for (id, action) in pending {
            self.dispatch_and_ack(id, action)?;
        }
        Ok(())
    }

    fn dispatch_and_ack(&mut self, id: Uuid, action: Action) -> Result<(), Error> {
        use crate::Outcome;

        for dispatcher in &mut self.dispatchers {
            match dispatcher.handle(&action) {
                Ok(Outcome::Handled) => {
                    let mut batch = self.store.batch();
                    self.store.delete_action(&mut batch, &id);
                    self.store.commit(batch)?;
                    return Ok(());
                }
                Ok(Outcome::NotApplicable) => continue,
                Err(e) => {
                    // Left un-acked: at-least-once delivery means it is
                    // retried on the next pass rather than lost.
                    warn!(target: "machine", "dispatcher rejected action {id}: {e}");
                    return Ok(());
                }
            }
        }
        warn!(target: "machine", "no dispatcher claimed action {id}: {action:?}");
        Ok(())
    }
}

impl pisa_blockchain::BlockSink for BlockchainMachine {
    type Error = Error;

    fn commit_block(&mut self, block: Block, cache: &BlockCache) -> Result<(), Error> {
        let mut batch = self.store.batch();
        self.store.put_block(&mut batch, &block)?;
        self.store.put_head(&mut batch, &block.hash);

        let mut emitted: Vec<(Uuid, Action)> = Vec::new();

        for component in &self.components {
            let anchor_key = AnchorKey::new(component.name(), block.hash);
            let parent_key = AnchorKey::new(component.name(), block.parent_hash);

            let prev = match self.store.get_anchor(&parent_key)? {
                Some(state) => state,
                None => component.initial_state(&block),
            };
            let next = component.reduce(&prev, &block, cache);
            let actions = component.detect_changes(&prev, &next);

            self.store.put_anchor(&mut batch, &anchor_key, &next)?;
            for action in actions {
                let id = Uuid::new_v4();
                self.store.put_action(&mut batch, &id, &action)?;
                emitted.push((id, action));
            }
        }

        self.store.commit(batch)?;

        // Dispatch after the batch that produced these actions is durable,
        // in fixed component order within the block.
        emitted.sort_by_key(|(_, action)| action.component_order());
        for (id, action) in emitted {
            self.dispatch_and_ack(id, action)?;
        }

        Ok(())
    }

    fn evict_block(&mut self, hash: BlockHash) -> Result<(), Error> {
        let mut batch = self.store.batch();
        self.store.delete_block(&mut batch, &hash);
        for component in &self.components {
            let key = AnchorKey::new(component.name(), hash);
            self.store.delete_anchor(&mut batch, &key);
        }
        self.store.commit(batch)?;
        Ok(())
    }
}
