use pisa_types::{BlockHash, BlockNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether an appointment's triggering event has been seen with enough
/// confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationState {
    NotObserved,
    Observed { at_block: BlockNumber, at_hash: BlockHash },
}

/// Everything the watcher needs about one appointment that doesn't change
/// from block to block, carried in the anchor state so `detect_changes` is
/// a pure function of two snapshots and never needs to look anything up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentWatch {
    pub end_block: BlockNumber,
    pub state: ObservationState,
    /// Set once `RemoveAppointment` has been emitted for this appointment,
    /// so a block past the removal threshold doesn't keep re-emitting it.
    pub removal_emitted: bool,
}

/// The watcher's anchor state at a given block: every appointment it knows
/// about, plus the height the snapshot was computed at (needed by
/// `detect_changes` to judge the removal threshold without re-deriving it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WatcherState {
    pub as_of_block: BlockNumber,
    pub watches: BTreeMap<pisa_types::AppointmentId, AppointmentWatch>,
}
