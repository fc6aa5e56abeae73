use std::fmt;

/// Transient node error: logged and swallowed by every caller,
/// retried on the next poll. There is no variant here that a caller should
/// treat as fatal — if the node is gone for good, the poller just keeps
/// trying and the operator notices via the logs.
#[derive(Debug, Clone)]
pub struct NodeError {
    pub message: String,
}

impl NodeError {
    pub fn new(message: impl Into<String>) -> Self {
        NodeError { message: message.into() }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node rpc error: {}", self.message)
    }
}

impl std::error::Error for NodeError {}
