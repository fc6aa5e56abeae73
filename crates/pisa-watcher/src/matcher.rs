use pisa_types::{Block, EventFilter};

/// True if any log in `block` matches `filter`: same address, same event
/// signature (topic 0), and every additional indexed-argument constraint
/// holds against the log's topic list.
pub fn block_has_match(block: &Block, filter: &EventFilter) -> bool {
    block.logs.iter().any(|log| log_matches(log, filter))
}

fn log_matches(log: &pisa_types::Log, filter: &EventFilter) -> bool {
    if log.address != filter.address {
        return false;
    }
    if log.topics.first() != Some(&filter.event_signature) {
        return false;
    }
    filter.topics.iter().all(|constraint| {
        log.topics.get(constraint.topic_index as usize + 1) == Some(&constraint.value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::{Address, H256};
    use pisa_types::{Log, TopicConstraint};

    fn filter(topics: Vec<TopicConstraint>) -> EventFilter {
        EventFilter { address: Address::from_low_u64_be(1), event_signature: H256::from_low_u64_be(9), topics }
    }

    fn log(address: u64, sig: u64, rest: Vec<u64>) -> Log {
        let mut topics = vec![H256::from_low_u64_be(sig)];
        topics.extend(rest.into_iter().map(H256::from_low_u64_be));
        Log { address: Address::from_low_u64_be(address), topics, data: vec![], transaction_hash: H256::zero() }
    }

    fn block_with(logs: Vec<Log>) -> Block {
        Block { hash: H256::zero(), parent_hash: H256::zero(), number: 0, transaction_hashes: vec![], logs, transactions: None }
    }

    #[test]
    fn matches_on_address_and_signature() {
        let f = filter(vec![]);
        let b = block_with(vec![log(1, 9, vec![])]);
        assert!(block_has_match(&b, &f));
    }

    #[test]
    fn rejects_wrong_address() {
        let f = filter(vec![]);
        let b = block_with(vec![log(2, 9, vec![])]);
        assert!(!block_has_match(&b, &f));
    }

    #[test]
    fn rejects_wrong_signature() {
        let f = filter(vec![]);
        let b = block_with(vec![log(1, 8, vec![])]);
        assert!(!block_has_match(&b, &f));
    }

    #[test]
    fn enforces_indexed_topic_constraints() {
        let f = filter(vec![TopicConstraint { topic_index: 0, value: H256::from_low_u64_be(42) }]);
        assert!(block_has_match(&f_block(42), &f));
        assert!(!block_has_match(&f_block(7), &f));
    }

    fn f_block(arg: u64) -> Block {
        block_with(vec![log(1, 9, vec![arg])])
    }
}
