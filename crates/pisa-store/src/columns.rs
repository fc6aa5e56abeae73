//! Column layout of the watchtower's single `kvdb` database.

/// `block/<hash>` — block metadata.
pub const BLOCK: u32 = 0;
/// `anchor/<component>/<blockHash>` — per-component anchor snapshots.
pub const ANCHOR: u32 = 1;
/// `action/<uuid>` — undispatched component actions.
pub const ACTION: u32 = 2;
/// `queue/<operatorAddr>` and `tx/<appointmentId>` — responder domain records.
pub const RESPONDER: u32 = 3;
/// `appointment/<id>` — appointment records.
pub const APPOINTMENT: u32 = 4;

pub const NUM_COLUMNS: u32 = 5;
