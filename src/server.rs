use thiserror::Error;

use crate::conn::Transaction;
use crate::types::Direction;

/// Engine version number, packed `0x00MMmmpp`. A server interface built
/// against a newer engine than this one is refused at engine creation.
pub const ENGINE_VERNUM: u32 = 0x0000_1000;

/// Engine ABI number, bumped on every breaking change to the callback
/// contracts.
pub const ENGINE_ABINUM: u32 = 1;

/// Errors that can occur when the engine calls back into the host server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// The host does not implement this operation. Soft-failed by the
    /// blocking subsystem
    #[error("Server interface operation not implemented by the host")]
    NotImplemented,

    /// The host refused the operation for this transaction. Soft-failed by
    /// the blocking subsystem
    #[error("Server interface declined the operation")]
    Declined,

    /// The host attempted the operation and it failed
    #[error("Server interface operation failed: {message}")]
    Failed { message: String },
}

impl ServerError {
    /// Whether a caller should treat this failure as advisory rather than
    /// propagating it (the host either cannot or will not perform the
    /// operation, but the engine's own state is intact).
    pub fn is_soft(&self) -> bool {
        matches!(self, ServerError::NotImplemented | ServerError::Declined)
    }
}

/// How the host should apply a header operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderAction {
    Set,
    Append,
    Merge,
    Add,
    Unset,
    Edit,
}

/// Identity of the host server implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerDescriptor {
    /// Engine version the host was built against, packed like
    /// [`ENGINE_VERNUM`].
    pub vernum: u32,
    /// Engine ABI the host was built against.
    pub abinum: u32,
    /// Host version string.
    pub version: String,
    /// Source file of the host glue, for diagnostics.
    pub filename: String,
    /// Host name, e.g. the web server product embedding the engine.
    pub name: String,
}

/// Callback interface the host server implements so the engine can apply
/// verdicts. The engine owns no sockets; every physical action goes through
/// here. All operations default to [`ServerError::NotImplemented`] so a
/// host only implements what it supports.
pub trait ServerInterface: Send + Sync {
    fn descriptor(&self) -> ServerDescriptor;

    /// Send an error response with the given status for this transaction.
    fn error_response(&self, tx: &Transaction, status: u16) -> Result<(), ServerError> {
        let _ = (tx, status);
        Err(ServerError::NotImplemented)
    }

    /// Add a header to the pending error response.
    fn error_header(&self, tx: &Transaction, name: &[u8], value: &[u8]) -> Result<(), ServerError> {
        let _ = (tx, name, value);
        Err(ServerError::NotImplemented)
    }

    /// Set the body of the pending error response.
    fn error_body(&self, tx: &Transaction, data: &[u8]) -> Result<(), ServerError> {
        let _ = (tx, data);
        Err(ServerError::NotImplemented)
    }

    /// Modify a live request or response header.
    fn header(
        &self,
        tx: &Transaction,
        direction: Direction,
        action: HeaderAction,
        name: &[u8],
        value: &[u8],
    ) -> Result<(), ServerError> {
        let _ = (tx, direction, action, name, value);
        Err(ServerError::NotImplemented)
    }

    /// Tear down the connection this transaction belongs to.
    fn close_connection(&self, tx: &Transaction) -> Result<(), ServerError> {
        let _ = tx;
        Err(ServerError::NotImplemented)
    }
}
