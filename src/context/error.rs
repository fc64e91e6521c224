use thiserror::Error;

/// Errors that can occur during context tree operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Context id does not address a live context
    #[error("Context #{index} does not exist (or was destroyed)")]
    UnknownContext { index: usize },

    /// Context is not in the state the operation requires
    #[error("Context `{context}` cannot transition from `{from}` to `{to}`")]
    InvalidTransition {
        context: String,
        from: &'static str,
        to: &'static str,
    },

    /// Operation requires the context to be open for configuration
    #[error("Context `{context}` is not open for configuration")]
    NotOpen { context: String },

    /// Location contexts require a site context as parent
    #[error("Context `{context}` needs a site context as parent before a location can be created")]
    SiteRequired { context: String },

    /// Context is not bound to a site, which the operation requires
    #[error("Context `{context}` is not bound to a site")]
    SiteNotBound { context: String },

    /// Site id does not address a registered site
    #[error("Site #{index} does not exist")]
    UnknownSite { index: usize },

    /// The configuration parser stack is empty
    #[error("Configuration block stack is empty")]
    ParserStackEmpty,

    /// A selector predicate failed while binding a context
    #[error("Context selector `{name}` failed: {message}")]
    SelectorFailed { name: String, message: String },

    /// A directive with this name is already registered
    #[error("Directive `{name}` is already registered")]
    DuplicateDirective { name: String },

    /// No directive with this name is registered
    #[error("Directive `{name}` is not registered")]
    UnknownDirective { name: String },

    /// A module's per-context callback failed
    #[error("Module `{module}` failed on context `{context}`: {message}")]
    ModuleCallbackFailed {
        module: String,
        context: String,
        message: String,
    },
}
