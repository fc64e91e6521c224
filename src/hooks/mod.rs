//! Hook registration and dispatch.
//!
//! Hooks are typed callbacks bound to a lifecycle [`State`]. Each state
//! expects one callback shape; registration validates the match and dispatch
//! walks the state's chain in registration order. A callback returning
//! [`HookVerdict::Declined`] is logged at debug and the chain continues; an
//! error stops the chain and propagates to the notifier's caller.

use log::{debug, error};

use crate::conn::{Connection, Header, RequestLine, ResponseLine, Transaction};
use crate::context::Context;
use crate::engine::Engine;
use crate::error::{CallbackError, EngineError};

mod error;
mod state;

pub use error::HookError;
pub use state::{CallbackShape, State};

/// Non-error outcome of a hook callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookVerdict {
    /// Continue with the next hook in the chain.
    Continue,
    /// Continue with the next hook; the decline is recorded at debug level.
    Declined,
}

/// What every hook callback returns.
pub type HookResult = Result<HookVerdict, CallbackError>;

pub type NullHookFn = Box<dyn Fn(&Engine, State) -> HookResult + Send + Sync>;
pub type ConnHookFn = Box<dyn Fn(&Engine, &mut Connection, State) -> HookResult + Send + Sync>;
pub type TxHookFn = Box<dyn Fn(&Engine, &mut Transaction, State) -> HookResult + Send + Sync>;
pub type TxDataHookFn =
    Box<dyn Fn(&Engine, &mut Transaction, State, &[u8]) -> HookResult + Send + Sync>;
pub type HeaderHookFn =
    Box<dyn Fn(&Engine, &mut Transaction, State, &[Header]) -> HookResult + Send + Sync>;
pub type ReqLineHookFn =
    Box<dyn Fn(&Engine, &mut Transaction, State, Option<&RequestLine>) -> HookResult + Send + Sync>;
pub type RespLineHookFn = Box<
    dyn Fn(&Engine, &mut Transaction, State, Option<&ResponseLine>) -> HookResult + Send + Sync,
>;
pub type CtxHookFn = Box<dyn Fn(&Engine, &Context, State) -> HookResult + Send + Sync>;

/// The tagged sum of hook callback types. The variant is validated against
/// the state's [`CallbackShape`] at registration.
pub enum HookFn {
    Null(NullHookFn),
    Conn(ConnHookFn),
    Tx(TxHookFn),
    TxData(TxDataHookFn),
    Header(HeaderHookFn),
    ReqLine(ReqLineHookFn),
    RespLine(RespLineHookFn),
    Ctx(CtxHookFn),
}

impl HookFn {
    pub fn shape(&self) -> CallbackShape {
        match self {
            HookFn::Null(_) => CallbackShape::Null,
            HookFn::Conn(_) => CallbackShape::Conn,
            HookFn::Tx(_) => CallbackShape::Tx,
            HookFn::TxData(_) => CallbackShape::TxData,
            HookFn::Header(_) => CallbackShape::Header,
            HookFn::ReqLine(_) => CallbackShape::ReqLine,
            HookFn::RespLine(_) => CallbackShape::RespLine,
            HookFn::Ctx(_) => CallbackShape::Ctx,
        }
    }
}

/// A registered hook: the callback plus the diagnostic name it was
/// registered under. The name stands in for the resolved symbol in error
/// and decline logs.
pub struct Hook {
    pub(crate) name: String,
    pub(crate) callback: HookFn,
}

impl Hook {
    pub fn name(&self) -> &str {
        &self.name
    }
}

// Registration

impl Engine {
    /// Register `hook` on `state`. Fails if the callback shape does not
    /// match the state's expected shape, or if the configuration window has
    /// closed; in either case the hook is not stored.
    pub fn register_hook(
        &mut self,
        state: State,
        name: impl Into<String>,
        hook: HookFn,
    ) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        let name = name.into();
        if hook.shape() != state.shape() {
            return Err(HookError::ShapeMismatch {
                hook: name,
                state: state.name(),
                expected: state.shape().name(),
                found: hook.shape().name(),
            }
            .into());
        }
        self.hook_chain_mut(state).push(Hook {
            name,
            callback: hook,
        });
        Ok(())
    }

    /// Register a connection-shaped hook.
    pub fn on_conn<F>(&mut self, state: State, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Connection, State) -> HookResult + Send + Sync + 'static,
    {
        self.register_hook(state, name, HookFn::Conn(Box::new(f)))
    }

    /// Register a transaction-shaped hook.
    pub fn on_tx<F>(&mut self, state: State, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Transaction, State) -> HookResult + Send + Sync + 'static,
    {
        self.register_hook(state, name, HookFn::Tx(Box::new(f)))
    }

    /// Register a body-data-shaped hook.
    pub fn on_tx_data<F>(&mut self, state: State, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Transaction, State, &[u8]) -> HookResult + Send + Sync + 'static,
    {
        self.register_hook(state, name, HookFn::TxData(Box::new(f)))
    }

    /// Register a header-shaped hook.
    pub fn on_header<F>(&mut self, state: State, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Transaction, State, &[Header]) -> HookResult + Send + Sync + 'static,
    {
        self.register_hook(state, name, HookFn::Header(Box::new(f)))
    }

    /// Register a request-line-shaped hook.
    pub fn on_request_line<F>(&mut self, state: State, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Transaction, State, Option<&RequestLine>) -> HookResult
            + Send
            + Sync
            + 'static,
    {
        self.register_hook(state, name, HookFn::ReqLine(Box::new(f)))
    }

    /// Register a response-line-shaped hook.
    pub fn on_response_line<F>(&mut self, state: State, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &mut Transaction, State, Option<&ResponseLine>) -> HookResult
            + Send
            + Sync
            + 'static,
    {
        self.register_hook(state, name, HookFn::RespLine(Box::new(f)))
    }

    /// Register a context-shaped hook.
    pub fn on_ctx<F>(&mut self, state: State, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &Context, State) -> HookResult + Send + Sync + 'static,
    {
        self.register_hook(state, name, HookFn::Ctx(Box::new(f)))
    }

    /// Register a null-shaped hook.
    pub fn on_engine<F>(&mut self, state: State, name: &str, f: F) -> Result<(), EngineError>
    where
        F: Fn(&Engine, State) -> HookResult + Send + Sync + 'static,
    {
        self.register_hook(state, name, HookFn::Null(Box::new(f)))
    }

    /// Number of hooks registered on `state`.
    pub fn hook_count(&self, state: State) -> usize {
        self.hook_chains[state.index()].len()
    }

    fn hook_chain_mut(&mut self, state: State) -> &mut Vec<Hook> {
        &mut self.hook_chains[state.index()]
    }
}

// Dispatch
//
// Each `fire_*` walks one state's chain in registration order. The chain
// table is addressed with an explicit bounds check so a state table and
// chain table that ever disagree surface as an error, not a panic.

macro_rules! chain {
    ($engine:expr, $state:expr) => {{
        let index = $state.index();
        if index >= $engine.hook_chains.len() {
            return Err(HookError::StateIndexOutOfRange {
                index,
                count: $engine.hook_chains.len(),
            });
        }
        &$engine.hook_chains[index]
    }};
}

impl Engine {
    pub(crate) fn fire_null(&self, state: State) -> Result<(), HookError> {
        for hook in chain!(self, state) {
            let result = match &hook.callback {
                HookFn::Null(f) => f(self, state),
                other => return Err(shape_drift(hook, state, other)),
            };
            settle(hook, state, result)?;
        }
        Ok(())
    }

    pub(crate) fn fire_conn(&self, conn: &mut Connection, state: State) -> Result<(), HookError> {
        for hook in chain!(self, state) {
            let result = match &hook.callback {
                HookFn::Conn(f) => f(self, conn, state),
                other => return Err(shape_drift(hook, state, other)),
            };
            settle(hook, state, result)?;
        }
        Ok(())
    }

    pub(crate) fn fire_tx(&self, tx: &mut Transaction, state: State) -> Result<(), HookError> {
        for hook in chain!(self, state) {
            let result = match &hook.callback {
                HookFn::Tx(f) => f(self, tx, state),
                other => return Err(shape_drift(hook, state, other)),
            };
            settle(hook, state, result)?;
        }
        Ok(())
    }

    pub(crate) fn fire_tx_data(
        &self,
        tx: &mut Transaction,
        state: State,
        data: &[u8],
    ) -> Result<(), HookError> {
        for hook in chain!(self, state) {
            let result = match &hook.callback {
                HookFn::TxData(f) => f(self, tx, state, data),
                other => return Err(shape_drift(hook, state, other)),
            };
            settle(hook, state, result)?;
        }
        Ok(())
    }

    pub(crate) fn fire_header(
        &self,
        tx: &mut Transaction,
        state: State,
        headers: &[Header],
    ) -> Result<(), HookError> {
        for hook in chain!(self, state) {
            let result = match &hook.callback {
                HookFn::Header(f) => f(self, tx, state, headers),
                other => return Err(shape_drift(hook, state, other)),
            };
            settle(hook, state, result)?;
        }
        Ok(())
    }

    pub(crate) fn fire_reqline(
        &self,
        tx: &mut Transaction,
        state: State,
        line: Option<&RequestLine>,
    ) -> Result<(), HookError> {
        for hook in chain!(self, state) {
            let result = match &hook.callback {
                HookFn::ReqLine(f) => f(self, tx, state, line),
                other => return Err(shape_drift(hook, state, other)),
            };
            settle(hook, state, result)?;
        }
        Ok(())
    }

    pub(crate) fn fire_respline(
        &self,
        tx: &mut Transaction,
        state: State,
        line: Option<&ResponseLine>,
    ) -> Result<(), HookError> {
        for hook in chain!(self, state) {
            let result = match &hook.callback {
                HookFn::RespLine(f) => f(self, tx, state, line),
                other => return Err(shape_drift(hook, state, other)),
            };
            settle(hook, state, result)?;
        }
        Ok(())
    }

    pub(crate) fn fire_ctx(&self, ctx: &Context, state: State) -> Result<(), HookError> {
        for hook in chain!(self, state) {
            let result = match &hook.callback {
                HookFn::Ctx(f) => f(self, ctx, state),
                other => return Err(shape_drift(hook, state, other)),
            };
            settle(hook, state, result)?;
        }
        Ok(())
    }
}

/// Fold one callback's result into chain control: declined continues with a
/// debug record, an error is logged with the hook's registered name and
/// stops the chain.
fn settle(hook: &Hook, state: State, result: HookResult) -> Result<(), HookError> {
    match result {
        Ok(HookVerdict::Continue) => Ok(()),
        Ok(HookVerdict::Declined) => {
            debug!("hook `{}` declined state `{}`", hook.name, state.name());
            Ok(())
        }
        Err(cause) => {
            error!(
                "hook `{}` failed at state `{}`: {}",
                hook.name,
                state.name(),
                cause
            );
            Err(HookError::CallbackFailed {
                hook: hook.name.clone(),
                state: state.name(),
                message: cause.message,
            })
        }
    }
}

// Registration guarantees shape-per-state, so a mismatch here means the
// chain table itself was corrupted.
fn shape_drift(hook: &Hook, state: State, found: &HookFn) -> HookError {
    error!(
        "hook `{}` stored with shape `{}` under state `{}` expecting `{}`",
        hook.name,
        found.shape().name(),
        state.name(),
        state.shape().name()
    );
    HookError::ShapeMismatch {
        hook: hook.name.clone(),
        state: state.name(),
        expected: state.shape().name(),
        found: found.shape().name(),
    }
}
