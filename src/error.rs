use thiserror::Error;

use crate::block::BlockError;
use crate::context::ContextError;
use crate::hooks::HookError;
use crate::notify::NotifyError;
use crate::server::ServerError;
use crate::stream::StreamError;

/// Error raised from inside a registered callback (hook, selector,
/// block hook, directive handler). The dispatching subsystem attaches the
/// callback's registered name before propagating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallbackError {
    pub message: String,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// General engine-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Registration attempted after the configuration window closed
    #[error("Engine configuration is locked; registration is only possible before configure_finished()")]
    ConfigurationLocked,

    /// The host server interface was built against a newer engine
    #[error("Server interface version {server_vernum} is newer than engine version {engine_vernum}")]
    IncompatibleServer {
        server_vernum: u32,
        engine_vernum: u32,
    },

    /// A module with the same name is already registered
    #[error("Module `{name}` is already registered")]
    DuplicateModule { name: String },

    /// A module's `init` failed during registration; the module was not
    /// stored
    #[error("Module `{module}` failed to initialize: {message}")]
    ModuleInit { module: String, message: String },

    /// A named entry already exists in the given registry
    #[error("`{name}` is already registered in the {registry} registry")]
    DuplicateName {
        registry: &'static str,
        name: String,
    },

    /// No entry with the given name exists in the given registry
    #[error("`{name}` is not registered in the {registry} registry")]
    NotFound {
        registry: &'static str,
        name: String,
    },

    /// Hook error
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    /// Notifier error
    #[error("Notifier error: {0}")]
    Notify(#[from] NotifyError),

    /// Context error
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    /// Stream pipeline error
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Blocking subsystem error
    #[error("Block error: {0}")]
    Block(#[from] BlockError),

    /// Server interface error
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Directive handler error
    #[error("Directive `{directive}` failed: {message}")]
    Directive { directive: String, message: String },
}
