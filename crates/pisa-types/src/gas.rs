//! A single outstanding slot in the multi-responder's gas queue.

use crate::appointment::AppointmentId;
use crate::identifier::TransactionIdentifier;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};

/// The request underlying a queue item: what to broadcast and which
/// appointment it discharges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasQueueRequest {
    pub identifier: TransactionIdentifier,
    pub appointment_id: AppointmentId,
    pub gas_limit: U256,
}

/// One nonce slot in a `GasQueue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasQueueItem {
    pub request: GasQueueRequest,
    pub nonce: U256,
    pub gas_price: U256,
}

impl GasQueueItem {
    pub fn identifier(&self) -> &TransactionIdentifier {
        &self.request.identifier
    }
}
