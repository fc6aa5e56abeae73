use ethereum_types::{Address, H256, U256};
use pisa_appointments::AppointmentStore;
use pisa_blockchain::{BlockCache, BlockProcessor};
use pisa_machine::BlockchainMachine;
use pisa_node::{NodeClient, NodeError};
use pisa_responder::{BalanceProvider, Broadcaster, MultiResponder, Responder, ResponderStore, StartResponseDispatcher};
use pisa_types::{Appointment, Block, EventFilter, GasQueueItem, Mode, MinedTransaction, ResponsePayload};
use pisa_watcher::Watcher;
use std::sync::{Arc, Mutex};

mod support {
    use super::*;

    /// An in-memory chain a test grows one block at a time, standing in for
    /// a real JSON-RPC node.
    pub struct FakeNode {
        blocks: Mutex<Vec<Block>>,
    }

    impl FakeNode {
        pub fn new(genesis: Block) -> Self {
            FakeNode { blocks: Mutex::new(vec![genesis]) }
        }

        pub fn push(&self, block: Block) {
            self.blocks.lock().unwrap().push(block);
        }
    }

    impl NodeClient for FakeNode {
        fn get_block_number(&self) -> Result<u64, NodeError> {
            Ok(self.blocks.lock().unwrap().last().unwrap().number)
        }

        fn get_block_by_hash(&self, hash: H256) -> Result<Option<Block>, NodeError> {
            Ok(self.blocks.lock().unwrap().iter().find(|b| b.hash == hash).cloned())
        }

        fn get_block_by_number(&self, number: u64, _with_txs: bool) -> Result<Option<Block>, NodeError> {
            Ok(self.blocks.lock().unwrap().iter().find(|b| b.number == number).cloned())
        }

        fn get_code(&self, _address: Address) -> Result<Vec<u8>, NodeError> {
            Ok(Vec::new())
        }

        fn get_transaction_count(&self, _address: Address, _pending: bool) -> Result<U256, NodeError> {
            Ok(U256::zero())
        }

        fn get_balance(&self, _address: Address) -> Result<U256, NodeError> {
            Ok(U256::from(u64::MAX))
        }

        fn get_gas_price(&self) -> Result<U256, NodeError> {
            Ok(U256::from(10))
        }

        fn send_raw_transaction(&self, _raw: Vec<u8>) -> Result<H256, NodeError> {
            Ok(H256::zero())
        }
    }

    /// Reports a generous balance and records every broadcast it is handed.
    pub struct FakeBroadcaster {
        pub sent: Mutex<Vec<GasQueueItem>>,
    }

    impl FakeBroadcaster {
        pub fn new() -> Self {
            FakeBroadcaster { sent: Mutex::new(Vec::new()) }
        }
    }

    impl BalanceProvider for FakeBroadcaster {
        fn estimate_gas_price(&self) -> Result<U256, String> {
            Ok(U256::from(10))
        }

        fn balance_of(&self, _address: Address) -> Result<U256, String> {
            Ok(U256::from(10_000_000_000_000_000_000u128))
        }
    }

    impl Broadcaster for FakeBroadcaster {
        fn broadcast(&self, item: &GasQueueItem) -> Result<(), String> {
            self.sent.lock().unwrap().push(item.clone());
            Ok(())
        }
    }

    pub fn block(number: u64, hash: u64, parent: u64, matching_log: bool, mined: Option<MinedTransaction>) -> Block {
        let logs = if matching_log {
            vec![pisa_types::Log {
                address: Address::from_low_u64_be(1),
                topics: vec![H256::from_low_u64_be(9)],
                data: vec![],
                transaction_hash: H256::zero(),
            }]
        } else {
            vec![]
        };
        Block {
            hash: H256::from_low_u64_be(hash),
            parent_hash: H256::from_low_u64_be(parent),
            number,
            transaction_hashes: vec![],
            logs,
            transactions: mined.map(|tx| vec![tx]),
        }
    }
}

use support::*;

const CHAIN_ID: u64 = 7;

fn appointment() -> Appointment {
    Appointment {
        customer_address: Address::from_low_u64_be(100),
        customer_chosen_id: H256::from_low_u64_be(1),
        nonce: 1,
        event_filter: EventFilter { address: Address::from_low_u64_be(1), event_signature: H256::from_low_u64_be(9), topics: vec![] },
        payload: ResponsePayload { to: Address::from_low_u64_be(2), calldata: vec![0xab], gas_limit: U256::from(21_000), value: U256::zero() },
        start_block: 1,
        end_block: 50,
        mode: Mode::EventTriggered,
        refund: U256::zero(),
        payment_hash: H256::zero(),
        customer_signature: vec![],
    }
}

#[test]
fn watches_responds_and_confirms_across_a_live_chain() {
    let operator_address = Address::from_low_u64_be(42);
    let store = pisa_store::open_memory();

    let appointment_store = Arc::new(AppointmentStore::open(store.clone()).unwrap());
    appointment_store.add_or_update_by_locator(appointment()).unwrap();

    let broadcaster = Arc::new(FakeBroadcaster::new());
    let responder_store = ResponderStore::new(store.clone(), operator_address);
    let multi_responder =
        Arc::new(MultiResponder::new(responder_store, broadcaster.clone(), broadcaster.clone(), operator_address, CHAIN_ID, 15, 12, U256::from(1)).unwrap());

    let watcher = Watcher::new(appointment_store.clone(), 2, 10);
    let responder = Responder::new(multi_responder.clone(), operator_address, 2, 100);
    let start_response = StartResponseDispatcher::new(multi_responder.clone(), appointment_store.clone());

    let mut machine = BlockchainMachine::new(store.clone());
    machine.register_component(Box::new(watcher));
    machine.register_component(Box::new(responder));
    machine.register_dispatcher(Box::new(pisa::dispatch::MultiResponderDispatcher::new(multi_responder.clone())));
    machine.register_dispatcher(Box::new(pisa::dispatch::AppointmentStoreDispatcher::new(appointment_store.clone())));
    machine.register_dispatcher(Box::new(start_response));

    let genesis = block(1, 1, 0, false, None);
    let mut cache = BlockCache::new(1, 1000);
    cache.add_block(genesis.clone());
    cache.set_head(genesis.hash);

    let node = Arc::new(FakeNode::new(genesis));
    let mut processor = BlockProcessor::new(node.clone(), cache);

    // block 1 is already head; this poll is a no-op.
    processor.poll(&mut machine).unwrap();

    // block 2 carries the triggering log, but confirmation depth isn't met yet.
    node.push(block(2, 2, 1, true, None));
    processor.poll(&mut machine).unwrap();
    assert!(broadcaster.sent.lock().unwrap().is_empty());

    // block 3: still short of the two-block confirmation depth.
    node.push(block(3, 3, 2, false, None));
    processor.poll(&mut machine).unwrap();
    assert!(broadcaster.sent.lock().unwrap().is_empty());

    // block 4: confirmation depth reached, StartResponse fires and broadcasts.
    node.push(block(4, 4, 3, false, None));
    processor.poll(&mut machine).unwrap();
    assert_eq!(broadcaster.sent.lock().unwrap().len(), 1);

    // block 5: the responder reducer picks up the newly tracked entry (one
    // block lag, since it was accepted mid-dispatch of block 4's actions).
    node.push(block(5, 5, 4, false, None));
    processor.poll(&mut machine).unwrap();

    // block 6 carries the operator's mined response transaction.
    let identifier_tx = MinedTransaction {
        hash: H256::from_low_u64_be(999),
        from: operator_address,
        to: Some(Address::from_low_u64_be(2)),
        value: U256::zero(),
        gas_limit: U256::from(21_000),
        input: vec![0xab],
        nonce: U256::zero(),
    };
    node.push(block(6, 6, 5, false, Some(identifier_tx)));
    processor.poll(&mut machine).unwrap();

    // blocks 7-8: two confirmations after the mine moves the entry to Confirmed.
    node.push(block(7, 7, 6, false, None));
    processor.poll(&mut machine).unwrap();
    node.push(block(8, 8, 7, false, None));
    processor.poll(&mut machine).unwrap();

    let verify_store = ResponderStore::new(store.clone(), operator_address);
    assert!(verify_store.all_tracked().unwrap().is_empty(), "confirmed response should have been retired");
    assert_eq!(broadcaster.sent.lock().unwrap().len(), 1, "no replacement broadcast should have been needed");
}
