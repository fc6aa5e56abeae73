use std::fmt;

/// Store errors are fatal: a batch commit failure or a corrupt record both
/// indicate the process should exit and let a restart replay from the last
/// good state, not that the caller should retry.
#[derive(Debug)]
pub enum Error {
    /// The underlying `kvdb` backend rejected a read or write.
    Backend(String),
    /// A stored record failed to deserialize; this means on-disk state does
    /// not match what this binary expects, not a routine runtime condition.
    Decode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Backend(msg) => write!(f, "store backend error: {msg}"),
            Error::Decode(msg) => write!(f, "store record decode error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
