//! At-least-once delivery of component actions to their collaborators.

use pisa_types::Action;
use std::fmt;

/// Raised when a collaborator cannot currently handle an action. The
/// machine leaves the action persisted and retries it on the next dispatch
/// pass rather than losing it.
#[derive(Debug, Clone)]
pub struct DispatchError(pub String);

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatch error: {}", self.0)
    }
}

impl std::error::Error for DispatchError {}

/// Whether a dispatcher recognized the action it was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// This dispatcher owns the action kind and handled it.
    Handled,
    /// Not this dispatcher's concern; the next one in line should try.
    NotApplicable,
}

/// A collaborator that consumes actions dispatched by the blockchain
/// machine service (multi-responder, appointment store, ...). `handle` is
/// expected to be idempotent: the same action id may be delivered more than
/// once (after a crash before the ack was persisted). Multiple dispatchers
/// can be registered; each is offered every action in order until one
/// reports `Handled`.
pub trait ActionDispatcher: Send + Sync {
    fn handle(&mut self, action: &Action) -> Result<Outcome, DispatchError>;
}
