use thiserror::Error;

/// Errors that can occur in the stream processor pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// No stream processor with this name is registered
    #[error("Stream processor `{name}` is not registered")]
    UnknownProcessor { name: String },

    /// A stream processor with this name is already registered
    #[error("Stream processor `{name}` is already registered")]
    DuplicateProcessor { name: String },

    /// Insertion index past the end of the pump's processor chain
    #[error("Insertion index {index} outside processor chain of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A processor returned an error; the push was aborted
    #[error("Stream processor `{name}` failed: {message}")]
    ProcessorFailed { name: String, message: String },
}
