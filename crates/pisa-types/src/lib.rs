// This file is part of the PISA watchtower core.

//! Core data model shared by every watchtower component: blocks, appointments,
//! transaction identifiers, gas queue items, declarative actions and the
//! anchor-state key that ties a component's per-block snapshot to a block hash.

pub mod action;
pub mod anchor;
pub mod appointment;
pub mod block;
pub mod gas;
pub mod identifier;

pub use action::{Action, ActionId};
pub use anchor::AnchorKey;
pub use appointment::{Appointment, AppointmentId, EventFilter, Mode, ModeError, ResponsePayload, TopicConstraint};
pub use block::{Block, BlockHash, BlockNumber, Log, MinedTransaction};
pub use gas::{GasQueueItem, GasQueueRequest};
pub use identifier::TransactionIdentifier;
