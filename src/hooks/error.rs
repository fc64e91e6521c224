use thiserror::Error;

/// Errors that can occur during hook registration and dispatch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// Callback shape does not match the state's expected shape; the hook
    /// was not stored
    #[error("Hook `{hook}` has shape `{found}` but state `{state}` expects shape `{expected}`")]
    ShapeMismatch {
        hook: String,
        state: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// State index outside the chain table. Indicates an internal state
    /// table error
    #[error("State index {index} outside hook chain table of {count} states")]
    StateIndexOutOfRange { index: usize, count: usize },

    /// A hook callback returned an error; remaining hooks in the chain were
    /// not invoked
    #[error("Hook `{hook}` failed at state `{state}`: {message}")]
    CallbackFailed {
        hook: String,
        state: &'static str,
        message: String,
    },
}
