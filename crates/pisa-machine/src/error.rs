use std::fmt;

/// Errors surfaced by [`crate::BlockchainMachine`] as a [`pisa_blockchain::BlockSink`].
/// Both variants are fatal (a store batch failure) — the process exits and
/// a restart replays from the last committed block.
#[derive(Debug)]
pub enum Error {
    Store(pisa_store::Error),
    Dispatch(crate::dispatch::DispatchError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(e) => write!(f, "{e}"),
            Error::Dispatch(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<pisa_store::Error> for Error {
    fn from(e: pisa_store::Error) -> Self {
        Error::Store(e)
    }
}
