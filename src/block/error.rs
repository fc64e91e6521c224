use thiserror::Error;

use crate::server::ServerError;

/// Errors that can occur in the blocking subsystem
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    /// A block handler is already installed; exactly one is allowed
    #[error("Block handler `{existing}` is already installed")]
    HandlerAlreadyInstalled { existing: String },

    /// A pre-block hook returned an error; the block was aborted
    #[error("Pre-block hook `{hook}` failed: {message}")]
    PreHookFailed { hook: String, message: String },

    /// The block handler returned an error
    #[error("Block handler `{handler}` failed: {message}")]
    HandlerFailed { handler: String, message: String },

    /// A post-block hook returned an error
    #[error("Post-block hook `{hook}` failed: {message}")]
    PostHookFailed { hook: String, message: String },

    /// The server interface failed to apply the block
    #[error("Server failed to apply block: {0}")]
    Server(#[from] ServerError),
}
