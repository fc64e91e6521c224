use thiserror::Error;

use crate::context::ContextError;
use crate::hooks::HookError;
use crate::stream::StreamError;

/// Errors that can occur while notifying lifecycle states
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The state was already notified for this connection or transaction
    #[error("State `{state}` was already notified")]
    AlreadyNotified { state: &'static str },

    /// A response line is required unless the transaction is HTTP/0.9
    #[error("Response started without a response line on a non-HTTP/0.9 transaction")]
    ResponseLineRequired,

    /// Hook dispatch failed; remaining hooks were not invoked
    #[error("Hook dispatch failed: {0}")]
    Hook(#[from] HookError),

    /// Context binding failed
    #[error("Context binding failed: {0}")]
    Context(#[from] ContextError),

    /// The body pipeline failed; the push was aborted
    #[error("Body pipeline failed: {0}")]
    Stream(#[from] StreamError),
}
