//! Declarative records emitted by a component's `detectChanges`.
//!
//! A reducer never calls a collaborator directly; it returns a list of these
//! and the blockchain machine service dispatches them at-least-once.

use crate::appointment::AppointmentId;
use crate::identifier::TransactionIdentifier;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique id of a persisted action, stable across restarts until the
/// dispatcher acks it.
pub type ActionId = Uuid;

/// A component action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Watcher: the appointment's event was observed with enough confirmations.
    StartResponse { appointment_id: AppointmentId, observed_at_block: u64 },
    /// Watcher: the appointment's window has closed beyond the reorg margin.
    RemoveAppointment { appointment_id: AppointmentId },
    /// Responder: a reorg evicted a transaction we believed was mined.
    ReEnqueueMissingItems { appointment_ids: Vec<AppointmentId> },
    /// Responder: our transaction was observed mined.
    TxMined { identifier: TransactionIdentifier, nonce: U256 },
    /// Responder: a transaction was mined, prompting a balance check.
    CheckResponderBalance,
    /// Responder: the appointment reached its confirmation target.
    EndResponse { appointment_id: AppointmentId },
    /// Machine-derived: an in-flight item has sat unmined for longer than
    /// the configured patience.
    StuckTx { appointment_id: AppointmentId, submitted_at_block: u64 },
}

impl Action {
    /// Fixed component order in which same-block actions are delivered:
    /// watcher before responder, machine-derived actions last.
    pub fn component_order(&self) -> u8 {
        match self {
            Action::StartResponse { .. } | Action::RemoveAppointment { .. } => 0,
            Action::ReEnqueueMissingItems { .. }
            | Action::TxMined { .. }
            | Action::CheckResponderBalance
            | Action::EndResponse { .. } => 1,
            Action::StuckTx { .. } => 2,
        }
    }
}
