// This file is part of the PISA watchtower core.

//! The reducer contract and the blockchain machine service that drives
//! registered components on every committed block, dispatching the actions
//! they emit at-least-once.

pub mod component;
pub mod dispatch;
pub mod error;
pub mod service;

pub use component::Component;
pub use dispatch::{ActionDispatcher, DispatchError, Outcome};
pub use error::Error;
pub use service::BlockchainMachine;
