//! A customer's signed hiring of the watchtower to respond to an on-chain event.

use crate::block::BlockNumber;
use crate::identifier::TransactionIdentifier;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Customer-chosen identity of an appointment. Identity is `customerChosenId`
/// alone; the customer address and nonce disambiguate resubmissions.
pub type AppointmentId = H256;

/// Closed enumeration of appointment modes. `TryFrom<u8>` is the only way to
/// construct one from an untrusted wire value, and it rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Submit the payload only after the triggering event is observed.
    EventTriggered,
    /// Submit the payload once the validity window opens, unconditionally.
    Relay,
}

impl TryFrom<u8> for Mode {
    type Error = ModeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::EventTriggered),
            1 => Ok(Mode::Relay),
            other => Err(ModeError::Unknown(other)),
        }
    }
}

/// Raised when an appointment's wire-level mode integer is outside `{0,1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeError {
    Unknown(u8),
}

impl std::fmt::Display for ModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeError::Unknown(v) => write!(f, "unknown appointment mode {v}, expected 0 or 1"),
        }
    }
}

impl std::error::Error for ModeError {}

/// An indexed-argument constraint on an event filter: the zero-based index
/// of the indexed topic (topic 0 is always the event signature and is not
/// itself constrained this way) and the value it must equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConstraint {
    pub topic_index: u8,
    pub value: H256,
}

/// The triggering event an event-triggered appointment watches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Contract address the event must originate from.
    pub address: Address,
    /// Event signature hash (topic 0).
    pub event_signature: H256,
    /// Additional indexed-argument constraints.
    pub topics: Vec<TopicConstraint>,
}

/// The transaction the watchtower submits on the customer's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub to: Address,
    pub calldata: Vec<u8>,
    pub gas_limit: U256,
    pub value: U256,
}

impl ResponsePayload {
    /// Builds the structural identifier used to recognize this payload's
    /// broadcast on chain, independent of nonce and gas price.
    pub fn identifier(&self, chain_id: u64) -> TransactionIdentifier {
        TransactionIdentifier::new(chain_id, self.calldata.clone(), self.to, self.value, self.gas_limit)
    }
}

/// An immutable, signed description of a job.
///
/// Schema validation, signature verification and ABI well-formedness are
/// assumed to have been done by the appointment-intake collaborator; this
/// type represents an already-validated appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub customer_address: Address,
    pub customer_chosen_id: AppointmentId,
    /// Strictly orders appointments sharing an id; a submission with a
    /// nonce not strictly greater than the stored one is rejected as stale,
    /// not treated as an error.
    pub nonce: u64,
    pub event_filter: EventFilter,
    pub payload: ResponsePayload,
    pub start_block: BlockNumber,
    pub end_block: BlockNumber,
    pub mode: Mode,
    pub refund: U256,
    pub payment_hash: H256,
    /// Customer signature binding every field above to the watchtower's
    /// on-chain identity. Opaque to the core: verified by the collaborator.
    pub customer_signature: Vec<u8>,
}
