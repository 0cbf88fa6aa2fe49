//! Watcher Error Hierarchy
//!
//! Every failure is local to one `watch_*` or chain call. Errors are raised
//! only after the call has released whatever it owned.

use std::time::Duration;

use config::ConfigError;

use crate::NodeId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A parent or chain-head selector did not resolve to a node
    #[error("Selector `{selector}` did not resolve to a node")]
    Resolution { selector: String },

    /// A chain step was abandoned because the chain deadline elapsed
    #[error("Aborted due to timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// A chain was cancelled through its abort handle
    #[error("Chain aborted")]
    Aborted,

    /// Watch requests must name at least one selector
    #[error("Watch request contains no selectors")]
    EmptyRequest,

    /// Chains must name at least one selector
    #[error("Selector chain is empty")]
    EmptyChain,

    /// A scope can drive exactly one chain
    #[error("Chain scope was already released")]
    ScopeReleased,

    /// Selector rejected by the tree
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Tree operation on a node that does not exist (or was removed)
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// The root of a tree cannot be detached
    #[error("The root node cannot be removed")]
    RootRemoval,

    /// Watches that subscribe need a tokio runtime to dispatch on
    #[error("No tokio runtime available to dispatch notifications")]
    RuntimeUnavailable,

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this error is a chain-level cancellation (deadline or abort).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Aborted)
    }
}
