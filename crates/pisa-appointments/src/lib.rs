// This file is part of the PISA watchtower core.

//! Durable store of customer appointments, keyed by customer-chosen id.

mod store;

pub use store::{AppointmentStore, UpdateOutcome};
