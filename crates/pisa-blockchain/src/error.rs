use pisa_types::BlockHash;
use std::fmt;

/// Deep-reorg detection: the processor walked back more than `max_depth`
/// blocks without meeting an attached ancestor. Fatal: out of the core's
/// recovery scope, the operator must intervene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepReorg {
    pub walked: u64,
    pub max_depth: u64,
}

impl fmt::Display for DeepReorg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deep reorg: walked {} blocks without meeting an attached ancestor (max depth {})",
            self.walked, self.max_depth
        )
    }
}

impl std::error::Error for DeepReorg {}

/// Block cache errors. `UnknownHash` and `NotAttached` are programmer
/// errors: reading a non-existent hash, or calling `set_head` on an unknown
/// one. Callers that cannot statically rule these out should treat them as
/// a bug to fix, not a condition to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    UnknownHash(BlockHash),
    NotAttached(BlockHash),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownHash(hash) => write!(f, "block cache: unknown hash {hash:?}"),
            Error::NotAttached(hash) => write!(f, "block cache: {hash:?} is not attached"),
        }
    }
}

impl std::error::Error for Error {}
