// This file is part of the PISA watchtower core.

//! Tracks in-flight responses and owns the operator's gas queue.

mod component;
mod multi;
mod queue;
mod state;
mod store;

pub use component::{Responder, TrackedEntry, TrackedSource};
pub use multi::{AppointmentLookup, BalanceProvider, Broadcaster, MultiResponder, StartResponseDispatcher};
pub use queue::{GasQueue, QueueError};
pub use state::{ResponderState, TrackingState};
pub use store::ResponderStore;
