//! The engine root object.
//!
//! An [`Engine`] is created with a host [`ServerInterface`], configured
//! through registration calls (modules, hooks, sites, selectors, stream
//! processors, variables, directives), and locked with
//! [`Engine::configure_finished`]. After the lock every registry is
//! read-only, so a shared engine reference can drive any number of
//! connections from any number of host threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::arena::Arena;
use crate::block::BlockRegistry;
use crate::bytestr::ByteStr;
use crate::config::EngineConfig;
use crate::conn::{Connection, Transaction};
use crate::context::{Context, ContextSelector};
use crate::error::EngineError;
use crate::hooks::{Hook, State};
use crate::module::Module;
use crate::server::{ServerInterface, ENGINE_ABINUM, ENGINE_VERNUM};
use crate::stream::{
    RawCapture, StreamProcessorDef, StreamProcessorRegistry, StreamPump, RAW_PROCESSOR,
};
use crate::types::{ConnId, CtxId, Direction, ModuleId, TxId};
use crate::case_map::CaseMap;
use crate::context::Site;
use crate::vars::{VarKey, VarRegistry};

mod registries;

pub use registries::{ActionFn, DirectiveFn, OperatorFn, TransformationFn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    Configuring,
    Running,
    ShutdownInitiated,
}

/// The root of the inspection engine.
pub struct Engine {
    pub(crate) config: EngineConfig,
    state: EngineState,
    pub(crate) primary_arena: Arena,
    pub(crate) config_arena: Arena,
    scratch_arena: Option<Arena>,
    pub(crate) server: Box<dyn ServerInterface>,
    pub(crate) modules: Vec<Box<dyn Module>>,
    pub(crate) hook_chains: Vec<Vec<Hook>>,
    pub(crate) directives: CaseMap<DirectiveFn>,
    pub(crate) transformations: CaseMap<registries::TransformationFn>,
    pub(crate) operators: CaseMap<registries::OperatorFn>,
    pub(crate) actions: CaseMap<registries::ActionFn>,
    pub(crate) stream_registry: StreamProcessorRegistry,
    pub(crate) block: BlockRegistry,
    pub(crate) contexts: Vec<Option<Context>>,
    pub(crate) engine_ctx: CtxId,
    pub(crate) main_ctx: CtxId,
    pub(crate) selectors: Vec<ContextSelector>,
    pub(crate) sites: Vec<Site>,
    pub(crate) vars: Arc<VarRegistry>,
    pub(crate) parser_stack: Vec<CtxId>,
    conn_counter: AtomicU64,
}

impl Engine {
    /// Create an engine. Refuses a server interface built against a newer
    /// engine version than this one.
    pub fn new(
        config: EngineConfig,
        server: Box<dyn ServerInterface>,
    ) -> Result<Engine, EngineError> {
        let descriptor = server.descriptor();
        if descriptor.vernum > ENGINE_VERNUM {
            return Err(EngineError::IncompatibleServer {
                server_vernum: descriptor.vernum,
                engine_vernum: ENGINE_VERNUM,
            });
        }
        debug!(
            "creating engine for server `{}` ({})",
            descriptor.name, descriptor.version
        );

        let primary_arena = Arena::root("engine");
        let config_arena = primary_arena.child("config");
        let scratch_arena = primary_arena.child("scratch");

        let mut engine = Engine {
            config,
            state: EngineState::Configuring,
            primary_arena,
            config_arena,
            scratch_arena: Some(scratch_arena),
            server,
            modules: Vec::new(),
            hook_chains: (0..State::COUNT).map(|_| Vec::new()).collect(),
            directives: CaseMap::new(),
            transformations: CaseMap::new(),
            operators: CaseMap::new(),
            actions: CaseMap::new(),
            stream_registry: StreamProcessorRegistry::new(),
            block: BlockRegistry::default(),
            contexts: Vec::new(),
            engine_ctx: CtxId(0),
            main_ctx: CtxId(0),
            selectors: Vec::new(),
            sites: Vec::new(),
            vars: Arc::new(VarRegistry::new()),
            parser_stack: Vec::new(),
            conn_counter: AtomicU64::new(0),
        };
        engine.bootstrap_contexts();
        engine
            .stream_registry
            .register(StreamProcessorDef::new(
                RAW_PROCESSOR,
                vec!["raw".to_string()],
                Box::new(|_tx, direction| -> Box<dyn crate::stream::StreamProcessor> {
                    Box::new(RawCapture::new(direction))
                }),
            ))
            .map_err(EngineError::from)?;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn server(&self) -> &dyn ServerInterface {
        self.server.as_ref()
    }

    pub fn vernum(&self) -> u32 {
        ENGINE_VERNUM
    }

    pub fn abinum(&self) -> u32 {
        ENGINE_ABINUM
    }

    /// The engine's primary allocation domain. Connection domains nest
    /// under it.
    pub fn arena(&self) -> &Arena {
        &self.primary_arena
    }

    /// The configuration allocation domain; context domains nest under it.
    pub fn config_arena(&self) -> &Arena {
        &self.config_arena
    }

    /// The scratch domain, alive only during the configuration window.
    pub fn scratch_arena(&self) -> Option<&Arena> {
        self.scratch_arena.as_ref()
    }

    pub fn is_configuring(&self) -> bool {
        self.state == EngineState::Configuring
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub(crate) fn ensure_configuring(&self) -> Result<(), EngineError> {
        if self.state == EngineState::Configuring {
            Ok(())
        } else {
            Err(EngineError::ConfigurationLocked)
        }
    }

    /// Close the configuration window. Every registry becomes read-only
    /// and the scratch arena is released.
    pub fn configure_finished(&mut self) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        self.scratch_arena = None;
        self.state = EngineState::Running;
        debug!("engine configuration finished; registries are now locked");
        Ok(())
    }

    /// Fire the `engine-shutdown-initiated` chain. The host calls this
    /// before tearing the engine down.
    pub fn notify_shutdown_initiated(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::ShutdownInitiated {
            return Ok(());
        }
        self.state = EngineState::ShutdownInitiated;
        self.fire_null(State::EngineShutdownInitiated)?;
        Ok(())
    }

    // Modules

    /// Register a module. The module's `init` runs immediately (this is
    /// where it registers hooks, directives and stream processors), then
    /// its per-context initializer runs for every existing non-engine
    /// context.
    pub fn register_module(&mut self, module: Box<dyn Module>) -> Result<ModuleId, EngineError> {
        self.ensure_configuring()?;
        if self.modules.iter().any(|m| m.name() == module.name()) {
            return Err(EngineError::DuplicateModule {
                name: module.name().to_owned(),
            });
        }
        let id = ModuleId(self.modules.len());
        module.init(self, id).map_err(|cause| EngineError::ModuleInit {
            module: module.name().to_owned(),
            message: cause.message,
        })?;
        for at in 0..self.contexts.len() {
            if CtxId(at) == self.engine_ctx {
                continue;
            }
            if let Some(ctx) = self.contexts[at].as_mut() {
                module.on_context_create(ctx, id).map_err(|cause| {
                    crate::context::ContextError::ModuleCallbackFailed {
                        module: module.name().to_owned(),
                        context: ctx.full_name(),
                        message: cause.message,
                    }
                })?;
            }
        }
        self.modules.push(module);
        Ok(id)
    }

    pub fn module(&self, id: ModuleId) -> Option<&dyn Module> {
        self.modules.get(id.0).map(|m| m.as_ref())
    }

    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.name() == name)
            .map(ModuleId)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // Variables

    /// Register a variable name, returning its dense key. Idempotent for
    /// already-registered names.
    pub fn var_register(&mut self, name: &str) -> Result<VarKey, EngineError> {
        self.ensure_configuring()?;
        match Arc::get_mut(&mut self.vars) {
            Some(registry) => Ok(registry.register(name)),
            None => Err(EngineError::ConfigurationLocked),
        }
    }

    pub fn var_lookup(&self, name: &str) -> Option<VarKey> {
        self.vars.lookup(name)
    }

    // Stream processors

    pub fn register_stream_processor(
        &mut self,
        def: StreamProcessorDef,
    ) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        self.stream_registry.register(def)?;
        Ok(())
    }

    pub fn stream_processor(&self, name: &str) -> Option<&StreamProcessorDef> {
        self.stream_registry.get(name)
    }

    /// Instantiate a registered processor into one of `tx`'s pumps at
    /// `index`. Index 0 is ahead of the built-in capture processor.
    pub fn tx_add_stream_processor(
        &self,
        tx: &mut Transaction,
        direction: Direction,
        name: &str,
        index: usize,
    ) -> Result<(), EngineError> {
        let processor = self.stream_registry.instantiate(name, tx, direction)?;
        let pump = match direction {
            Direction::Request => &mut tx.request_pump,
            Direction::Response => &mut tx.response_pump,
        };
        pump.insert(index, name, processor)?;
        Ok(())
    }

    // Connection / transaction factories

    /// Create a connection object for a host socket. The connection's
    /// allocation domain nests under the engine's primary domain, and its
    /// context starts at main until `notify_conn_opened` binds one.
    pub fn conn_create(
        &self,
        remote_ip: &str,
        remote_port: u16,
        local_ip: &str,
        local_port: u16,
    ) -> Connection {
        let id = ConnId(self.conn_counter.fetch_add(1, Ordering::Relaxed) + 1);
        Connection::new(
            id,
            self.primary_arena.child("conn"),
            self.main_ctx,
            ByteStr::from(remote_ip),
            remote_port,
            ByteStr::from(local_ip),
            local_port,
        )
    }

    /// Create a transaction on `conn` and append it to the connection's
    /// queue. Both body pumps get the built-in capture processor at
    /// index 0. Appending a second transaction marks both it and the
    /// first as pipelined.
    pub fn tx_create(&self, conn: &mut Connection) -> Result<TxId, EngineError> {
        let mut tx = Transaction::new(
            conn.id(),
            conn.arena.child("tx"),
            conn.ctx(),
            conn.remote_ip().clone(),
            conn.remote_port(),
            conn.local_ip().clone(),
            conn.local_port(),
            self.vars.clone(),
            self.config.request_body_log_limit,
            self.config.response_body_log_limit,
            self.config.blocking_mode,
        );
        let mut request_pump = StreamPump::new(Direction::Request);
        request_pump.insert(
            0,
            RAW_PROCESSOR,
            self.stream_registry
                .instantiate(RAW_PROCESSOR, &tx, Direction::Request)?,
        )?;
        let mut response_pump = StreamPump::new(Direction::Response);
        response_pump.insert(
            0,
            RAW_PROCESSOR,
            self.stream_registry
                .instantiate(RAW_PROCESSOR, &tx, Direction::Response)?,
        )?;
        tx.request_pump = request_pump;
        tx.response_pump = response_pump;
        Ok(conn.push_tx(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn engine_is_shareable_and_entities_are_sendable() {
        assert_send_sync::<Engine>();
        assert_send::<Connection>();
        assert_send::<Transaction>();
    }
}

impl Drop for Engine {
    /// Contexts are destroyed in reverse creation order with engine and
    /// main last, then modules are released in reverse load order.
    fn drop(&mut self) {
        let ids: Vec<CtxId> = self.context_ids();
        for id in ids.into_iter().rev() {
            if id == self.engine_ctx || id == self.main_ctx {
                continue;
            }
            if self.context(id).is_ok() {
                let _ = self.context_destroy(id);
            }
        }
        let main = self.main_ctx;
        let engine_ctx = self.engine_ctx;
        if self.context(main).is_ok() {
            let _ = self.context_destroy(main);
        }
        if self.context(engine_ctx).is_ok() {
            let _ = self.context_destroy(engine_ctx);
        }
        while self.modules.pop().is_some() {}
    }
}
