// This file is part of the PISA watchtower core.

//! Watches appointments for their triggering on-chain event.

mod component;
mod matcher;
mod source;
mod state;

pub use component::Watcher;
pub use source::AppointmentSource;
pub use state::{AppointmentWatch, ObservationState, WatcherState};
