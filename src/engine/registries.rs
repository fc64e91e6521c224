//! Named registries the rule engine and modules draw from:
//! transformations, operators, actions and configuration directives. All
//! of them are populated during the configuration window and read-only
//! afterwards.

use std::sync::Arc;

use crate::conn::Transaction;
use crate::context::ContextError;
use crate::engine::Engine;
use crate::error::{CallbackError, EngineError};
use crate::types::CtxId;
use crate::vars::VarValue;

/// Transforms a byte sequence (e.g. lowercase, url-decode).
pub type TransformationFn = Box<dyn Fn(&[u8]) -> Result<Vec<u8>, CallbackError> + Send + Sync>;

/// Tests a variable value against a transaction (e.g. contains, rx).
pub type OperatorFn =
    Box<dyn Fn(&Transaction, &VarValue) -> Result<bool, CallbackError> + Send + Sync>;

/// Applies an effect to a transaction (e.g. set a variable, block).
pub type ActionFn =
    Box<dyn Fn(&Engine, &mut Transaction) -> Result<(), CallbackError> + Send + Sync>;

/// Handles one configuration directive, dispatched with the context the
/// parser is currently inside. Shared so a handler can re-enter the
/// engine while it runs.
pub type DirectiveFn =
    Arc<dyn Fn(&mut Engine, CtxId, &[&str]) -> Result<(), CallbackError> + Send + Sync>;

impl Engine {
    pub fn register_transformation<F>(&mut self, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, CallbackError> + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        if self.transformations.contains_key(name) {
            return Err(EngineError::DuplicateName {
                registry: "transformation",
                name: name.to_owned(),
            });
        }
        self.transformations.insert(name, Box::new(f));
        Ok(())
    }

    pub fn transformation(&self, name: &str) -> Option<&TransformationFn> {
        self.transformations.get(name)
    }

    pub fn register_operator<F>(&mut self, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Transaction, &VarValue) -> Result<bool, CallbackError> + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        if self.operators.contains_key(name) {
            return Err(EngineError::DuplicateName {
                registry: "operator",
                name: name.to_owned(),
            });
        }
        self.operators.insert(name, Box::new(f));
        Ok(())
    }

    pub fn operator(&self, name: &str) -> Option<&OperatorFn> {
        self.operators.get(name)
    }

    pub fn register_action<F>(&mut self, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Transaction) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        if self.actions.contains_key(name) {
            return Err(EngineError::DuplicateName {
                registry: "action",
                name: name.to_owned(),
            });
        }
        self.actions.insert(name, Box::new(f));
        Ok(())
    }

    pub fn action(&self, name: &str) -> Option<&ActionFn> {
        self.actions.get(name)
    }

    // Directives

    /// Register a configuration directive. Directive names are ASCII
    /// case-insensitive, the way configuration languages treat them.
    pub fn register_directive<F>(&mut self, name: &str, handler: F) -> Result<(), EngineError>
    where
        F: Fn(&mut Engine, CtxId, &[&str]) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        if self.directives.contains_key(name) {
            return Err(ContextError::DuplicateDirective {
                name: name.to_owned(),
            }
            .into());
        }
        self.directives.insert(name, Arc::new(handler));
        Ok(())
    }

    /// Dispatch one parsed directive against the context the parser is
    /// currently inside. Called by the external configuration parser.
    pub fn directive_process(&mut self, name: &str, args: &[&str]) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        let handler = match self.directives.get(name) {
            Some(handler) => Arc::clone(handler),
            None => {
                return Err(ContextError::UnknownDirective {
                    name: name.to_owned(),
                }
                .into());
            }
        };
        let ctx = self.current_context();
        handler(self, ctx, args).map_err(|cause| EngineError::Directive {
            directive: name.to_owned(),
            message: cause.message,
        })
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }
}
