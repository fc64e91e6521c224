//! # Hornet
//! An embeddable HTTP transaction inspection engine. The host server owns
//! sockets and threads and drives the engine through synchronous
//! notification entry points; the engine runs the transaction lifecycle
//! state machine, dispatches typed hooks to registered modules, binds
//! traffic to hierarchical configuration contexts, streams bodies through
//! processor chains and coordinates block verdicts back through the
//! host's server interface.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod arena;
mod block;
mod bytestr;
mod case_map;
mod config;
mod conn;
mod context;
mod engine;
mod error;
mod hooks;
mod module;
mod notify;
mod server;
mod stream;
mod types;
mod vars;

pub use arena::Arena;
pub use block::{
    BlockError, BlockHandlerFn, BlockInfo, BlockMethod, BlockOutcome, BlockPostHookFn,
    BlockPreHookFn, DEFAULT_BLOCK_STATUS,
};
pub use bytestr::{ByteStr, EMPTY};
pub use case_map::CaseMap;
pub use config::EngineConfig;
pub use conn::{
    BodyCapture, ConnFlags, Connection, Header, RequestLine, ResponseLine, Transaction, TxFlags,
};
pub use context::{
    AuditLogSettings, CfgValue, Context, ContextError, ContextState, ContextType, SelectorFn,
    SelectorTarget, Site, SiteLocation,
};
pub use engine::{ActionFn, DirectiveFn, Engine, OperatorFn, TransformationFn};
pub use error::{CallbackError, EngineError};
pub use hooks::{
    CallbackShape, ConnHookFn, CtxHookFn, HeaderHookFn, Hook, HookError, HookFn, HookResult,
    HookVerdict, NullHookFn, ReqLineHookFn, RespLineHookFn, State, TxDataHookFn, TxHookFn,
};
pub use module::{Module, ModuleConfigSlots, ModuleSlots, MODULE_ABINUM};
pub use notify::NotifyError;
pub use server::{
    HeaderAction, ServerDescriptor, ServerError, ServerInterface, ENGINE_ABINUM, ENGINE_VERNUM,
};
pub use stream::{
    SegmentType, StreamError, StreamIo, StreamProcessor, StreamProcessorDef,
    StreamProcessorFactory, StreamProcessorRegistry, StreamPump, StreamSegment, RAW_PROCESSOR,
};
pub use types::{ConnId, CtxId, Direction, LocationId, ModuleId, SiteId, TxId};
pub use vars::{VarKey, VarRegistry, VarStore, VarValue};
