// This file is part of the PISA watchtower core.

//! Library half of the composition root, split out from `main.rs` so
//! integration tests can exercise the dispatcher wiring and the node client
//! without going through the process entry point.

pub mod dispatch;
pub mod node_client;
pub mod operator;
