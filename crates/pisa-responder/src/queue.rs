use ethereum_types::U256;
use pisa_types::{GasQueueItem, GasQueueRequest, TransactionIdentifier};
use std::fmt;

/// Raised by [`GasQueue::add`] when the queue is already at `maxDepth`. Not
/// fatal: the caller drops the request and the customer is never charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    Capacity,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Capacity => write!(f, "gas queue is at capacity"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Nonce-ordered queue of broadcasts the operator key owes the chain, with a
/// replace-by-fee-rate pass keeping it weakly decreasing toward the tail.
/// Every mutator returns a new queue rather than mutating in place, so the
/// caller can diff old against new to know what to (re)broadcast.
#[derive(Debug, Clone)]
pub struct GasQueue {
    items: Vec<GasQueueItem>,
    empty_nonce: U256,
    replacement_rate: u64,
    max_depth: usize,
}

impl GasQueue {
    pub fn new(empty_nonce: U256, replacement_rate: u64, max_depth: usize) -> Self {
        GasQueue { items: Vec::new(), empty_nonce, replacement_rate, max_depth }
    }

    /// Rebuilds a queue from a durable snapshot without re-validating how it
    /// got into this shape (it was checked before being persisted).
    pub fn from_items(items: Vec<GasQueueItem>, empty_nonce: U256, replacement_rate: u64, max_depth: usize) -> Self {
        GasQueue { items, empty_nonce, replacement_rate, max_depth }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[GasQueueItem] {
        &self.items
    }

    pub fn empty_nonce(&self) -> U256 {
        self.empty_nonce
    }

    pub fn replacement_rate(&self) -> u64 {
        self.replacement_rate
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Appends `request` at the tail with `gas_price`, then runs the
    /// replace pass and re-checks I1/I2/I3.
    pub fn add(&self, request: GasQueueRequest, gas_price: U256) -> Result<GasQueue, QueueError> {
        if self.items.len() >= self.max_depth {
            return Err(QueueError::Capacity);
        }
        let nonce = self.empty_nonce + U256::from(self.items.len());
        let mut items = self.items.clone();
        items.push(GasQueueItem { request, nonce, gas_price });

        let mut next = GasQueue { items, ..self.clone() };
        next.replace_pass();
        next.check_invariants();
        Ok(next)
    }

    /// Bubbles each item toward the head while its gas price beats the
    /// adjacent predecessor's by at least `replacementRate` percent,
    /// swapping request and price (not nonce) in place.
    fn replace_pass(&mut self) {
        for start in 1..self.items.len() {
            let mut i = start;
            while i > 0 {
                let predecessor_price = self.items[i - 1].gas_price;
                let threshold = predecessor_price + predecessor_price * U256::from(self.replacement_rate) / U256::from(100);
                if self.items[i].gas_price > predecessor_price && self.items[i].gas_price >= threshold {
                    let (lower, upper) = self.items.split_at_mut(i);
                    let prev = &mut lower[i - 1];
                    let cur = &mut upper[0];
                    std::mem::swap(&mut prev.request, &mut cur.request);
                    std::mem::swap(&mut prev.gas_price, &mut cur.gas_price);
                    i -= 1;
                } else {
                    break;
                }
            }
        }
    }

    /// Removes the head if it matches `(identifier, nonce)`, advancing
    /// `emptyNonce`. No-op otherwise: the local view and chain disagree
    /// transiently and will converge on the next block.
    pub fn consume(&self, identifier: &TransactionIdentifier, nonce: U256) -> GasQueue {
        match self.items.first() {
            Some(head) if head.nonce == nonce && head.identifier() == identifier => {
                let mut items = self.items.clone();
                items.remove(0);
                let next = GasQueue { items, empty_nonce: self.empty_nonce + U256::one(), ..self.clone() };
                next.check_invariants();
                next
            }
            _ => self.clone(),
        }
    }

    /// Items present in `self` but not in `other`, by full equality
    /// (request, nonce and gas price all match). Used to decide which
    /// broadcasts a queue mutation requires.
    pub fn difference(&self, other: &GasQueue) -> Vec<GasQueueItem> {
        self.items.iter().filter(|item| !other.items.contains(item)).cloned().collect()
    }

    /// I1 (contiguous nonces from `emptyNonce`), I2 (weakly decreasing gas
    /// price toward the tail) and I3 (`length <= maxDepth`). A violation is
    /// a programmer error: the queue's own operations must never produce one.
    fn check_invariants(&self) {
        for (i, item) in self.items.iter().enumerate() {
            assert_eq!(item.nonce, self.empty_nonce + U256::from(i), "gas queue I1 violated: non-contiguous nonce");
        }
        for pair in self.items.windows(2) {
            assert!(pair[0].gas_price >= pair[1].gas_price, "gas queue I2 violated: gas price increases toward the tail");
        }
        assert!(self.items.len() <= self.max_depth, "gas queue I3 violated: exceeds max depth");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::{Address, H256};

    fn request(id: u64) -> GasQueueRequest {
        GasQueueRequest {
            identifier: TransactionIdentifier::new(1, vec![id as u8], Address::from_low_u64_be(id), U256::zero(), U256::from(21000)),
            appointment_id: H256::from_low_u64_be(id),
            gas_limit: U256::from(21000),
        }
    }

    #[test]
    fn add_assigns_contiguous_nonces() {
        let q = GasQueue::new(U256::from(5), 10, 4);
        let q = q.add(request(1), U256::from(100)).unwrap();
        let q = q.add(request(2), U256::from(90)).unwrap();
        assert_eq!(q.items()[0].nonce, U256::from(5));
        assert_eq!(q.items()[1].nonce, U256::from(6));
    }

    #[test]
    fn rejects_past_capacity() {
        let q = GasQueue::new(U256::zero(), 10, 1);
        let q = q.add(request(1), U256::from(100)).unwrap();
        assert_eq!(q.add(request(2), U256::from(90)), Err(QueueError::Capacity));
    }

    #[test]
    fn replacement_bubbles_higher_fee_to_the_head() {
        let q = GasQueue::new(U256::zero(), 15, 4);
        let q = q.add(request(1), U256::from(100)).unwrap();
        let before = q.clone();
        let after = q.add(request(2), U256::from(150)).unwrap();

        assert_eq!(after.items()[0].request.appointment_id, H256::from_low_u64_be(2));
        assert_eq!(after.items()[0].gas_price, U256::from(150));
        assert_eq!(after.items()[1].request.appointment_id, H256::from_low_u64_be(1));
        assert_eq!(after.items()[1].gas_price, U256::from(100));

        let diff = after.difference(&before);
        assert_eq!(diff.len(), 2, "both nonce slots changed contents and must be rebroadcast");
    }

    #[test]
    fn consume_advances_empty_nonce_on_head_match() {
        let q = GasQueue::new(U256::zero(), 10, 4);
        let q = q.add(request(1), U256::from(100)).unwrap();
        let r1 = q.items()[0].request.identifier.clone();
        let consumed = q.consume(&r1, U256::zero());
        assert!(consumed.is_empty());

        let other_id = TransactionIdentifier::new(9, vec![], Address::zero(), U256::zero(), U256::zero());
        let no_op = q.consume(&other_id, U256::zero());
        assert_eq!(no_op.len(), 1, "mismatched identifier is a no-op");
    }
}
