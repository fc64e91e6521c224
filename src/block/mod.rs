//! The blocking subsystem.
//!
//! Detection and blocking are decoupled: a module that decides a
//! transaction must not proceed calls [`Engine::tx_block`], and the engine
//! coordinates pre-hooks, the policy handler and the server-mediated
//! application of the verdict. A transaction whose blocking mode is off
//! gets an advisory block: recorded and visible, but never applied.

use log::{debug, error};

use crate::conn::{Transaction, TxFlags};
use crate::engine::Engine;
use crate::error::{CallbackError, EngineError};

mod error;

pub use error::BlockError;

/// Status code used when no block handler is installed.
pub const DEFAULT_BLOCK_STATUS: u16 = 403;

/// How a block is applied to the transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockMethod {
    /// End the transaction with an error response.
    Status,
    /// Tear down the connection.
    Close,
}

/// The verdict produced by the block handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub method: BlockMethod,
    pub status: u16,
}

impl BlockInfo {
    /// Block by responding with `status`.
    pub fn status(status: u16) -> Self {
        Self {
            method: BlockMethod::Status,
            status,
        }
    }

    /// Block by closing the connection.
    pub fn close() -> Self {
        Self {
            method: BlockMethod::Close,
            status: 0,
        }
    }
}

/// What a call to [`Engine::tx_block`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block was applied through the server interface.
    Blocked,
    /// Blocking mode is off: the block was recorded but not applied.
    Advisory,
    /// The handler declined; no block info was recorded.
    HandlerDeclined,
}

pub type BlockPreHookFn =
    Box<dyn Fn(&Engine, &mut Transaction) -> Result<(), CallbackError> + Send + Sync>;
pub type BlockHandlerFn =
    Box<dyn Fn(&Engine, &Transaction) -> Result<Option<BlockInfo>, CallbackError> + Send + Sync>;
pub type BlockPostHookFn =
    Box<dyn Fn(&Engine, &mut Transaction, &BlockInfo) -> Result<(), CallbackError> + Send + Sync>;

/// Engine-side registration state for the blocking subsystem.
#[derive(Default)]
pub(crate) struct BlockRegistry {
    pub(crate) handler: Option<(String, BlockHandlerFn)>,
    pub(crate) pre_hooks: Vec<(String, BlockPreHookFn)>,
    pub(crate) post_hooks: Vec<(String, BlockPostHookFn)>,
}

impl Engine {
    /// Install the block policy handler. Exactly one may be installed; if
    /// none is, blocks default to `STATUS 403`.
    pub fn set_block_handler<F>(&mut self, name: &str, handler: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &Transaction) -> Result<Option<BlockInfo>, CallbackError>
            + Send
            + Sync
            + 'static,
    {
        self.ensure_configuring()?;
        if let Some((existing, _)) = &self.block.handler {
            return Err(BlockError::HandlerAlreadyInstalled {
                existing: existing.clone(),
            }
            .into());
        }
        self.block.handler = Some((name.to_owned(), Box::new(handler)));
        Ok(())
    }

    /// Register a hook that runs before the block handler. Any error
    /// aborts the block.
    pub fn register_block_pre_hook<F>(&mut self, name: &str, hook: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Transaction) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        self.block.pre_hooks.push((name.to_owned(), Box::new(hook)));
        Ok(())
    }

    /// Register a hook that runs after a block was recorded, with the
    /// final block info.
    pub fn register_block_post_hook<F>(&mut self, name: &str, hook: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Transaction, &BlockInfo) -> Result<(), CallbackError>
            + Send
            + Sync
            + 'static,
    {
        self.ensure_configuring()?;
        self.block
            .post_hooks
            .push((name.to_owned(), Box::new(hook)));
        Ok(())
    }

    /// Block `tx`.
    ///
    /// Idempotent: once a transaction is blocked, further calls return the
    /// recorded outcome without re-running hooks or the handler.
    pub fn tx_block(&self, tx: &mut Transaction) -> Result<BlockOutcome, BlockError> {
        if tx.is_blocked() {
            return Ok(match tx.block_info() {
                Some(_) if tx.blocking_mode() => BlockOutcome::Blocked,
                Some(_) => BlockOutcome::Advisory,
                None => BlockOutcome::HandlerDeclined,
            });
        }
        tx.flags.insert(TxFlags::BLOCKED);

        for (name, hook) in &self.block.pre_hooks {
            hook(self, tx).map_err(|cause| {
                error!("pre-block hook `{name}` failed: {cause}");
                BlockError::PreHookFailed {
                    hook: name.clone(),
                    message: cause.message,
                }
            })?;
        }

        let info = match &self.block.handler {
            Some((name, handler)) => handler(self, tx).map_err(|cause| {
                error!("block handler `{name}` failed: {cause}");
                BlockError::HandlerFailed {
                    handler: name.clone(),
                    message: cause.message,
                }
            })?,
            None => Some(BlockInfo::status(DEFAULT_BLOCK_STATUS)),
        };

        let info = match info {
            Some(info) => info,
            None => {
                debug!("block handler declined to block transaction {:?}", tx.id());
                return Ok(BlockOutcome::HandlerDeclined);
            }
        };
        tx.set_block_info(info);

        let enforce = tx.blocking_mode();
        if enforce {
            let applied = match info.method {
                BlockMethod::Status => self.server.error_response(tx, info.status),
                BlockMethod::Close => self.server.close_connection(tx),
            };
            if let Err(cause) = applied {
                if cause.is_soft() {
                    debug!(
                        "server could not apply {:?} block for transaction {:?}: {cause}",
                        info.method,
                        tx.id()
                    );
                } else {
                    error!(
                        "server failed applying {:?} block for transaction {:?}: {cause}",
                        info.method,
                        tx.id()
                    );
                    return Err(cause.into());
                }
            }
        }

        for (name, hook) in &self.block.post_hooks {
            hook(self, tx, &info).map_err(|cause| {
                error!("post-block hook `{name}` failed: {cause}");
                BlockError::PostHookFailed {
                    hook: name.clone(),
                    message: cause.message,
                }
            })?;
        }

        if enforce {
            Ok(BlockOutcome::Blocked)
        } else {
            debug!(
                "advisory block recorded for transaction {:?} (blocking mode off)",
                tx.id()
            );
            Ok(BlockOutcome::Advisory)
        }
    }
}
