// This file is part of the PISA watchtower core.

//! The block cache and the node-following block processor.
//!
//! Unlike a smart-pointer block tree (`ethcore-blockchain`'s `BlockChain`
//! owning RLP-encoded headers linked by hash), blocks live in an arena keyed
//! purely by hash: parent "pointers" are just `parent_hash` values and
//! pruning is a scan of the hash index by height.

pub mod cache;
pub mod error;
pub mod processor;

pub use cache::{AddResult, BlockCache};
pub use error::Error;
pub use processor::{BlockProcessor, BlockSink};
