//! Structured errors for callback dispatch.
//!
//! The error type is `Clone` so failures can travel through shared result
//! futures and be observed by every reader of an envelope's outcome.

use std::time::Duration;

use crate::callback::Callback;

/// Errors surfaced by callback dispatch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// No handler accepted a callback that required acceptance.
    #[error("no handler accepted {0}")]
    NotHandled(Box<Callback>),

    /// An aspect's before hook vetoed the operation.
    #[error("{0} was rejected")]
    Rejected(Box<Callback>),

    /// A wrapped future did not settle within the configured duration.
    #[error("{callback} timed out after {after:?}")]
    Timeout {
        callback: Box<Callback>,
        after: Duration,
    },

    /// A capability member raised a failure.
    #[error("invocation of '{member}' failed: {reason}")]
    Invocation { member: String, reason: String },
}

impl DispatchError {
    /// The envelope the failure relates to, when one was captured.
    pub fn callback(&self) -> Option<&Callback> {
        match self {
            DispatchError::NotHandled(cb) | DispatchError::Rejected(cb) => Some(cb),
            DispatchError::Timeout { callback, .. } => Some(callback),
            DispatchError::Invocation { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
