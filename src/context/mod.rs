//! The hierarchical configuration context tree.
//!
//! Contexts form the chain engine → main → site → location; each carries
//! per-module configuration data, a named setting overlay and audit log
//! settings. The external configuration parser builds the tree through
//! [`Engine::context_create`], [`Engine::context_open`] and
//! [`Engine::context_close`], and live traffic is bound to the most
//! specific matching context by the selector.

use std::path::{Path, PathBuf};

use log::warn;

use crate::arena::Arena;
use crate::case_map::CaseMap;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::hooks::State;
use crate::module::ModuleConfigSlots;
use crate::types::{CtxId, LocationId, ModuleId, SiteId};

mod auditlog;
mod error;
mod selector;
mod site;

pub use auditlog::AuditLogSettings;
pub use error::ContextError;
pub use selector::{SelectorFn, SelectorTarget};
pub use site::{Site, SiteLocation};

pub(crate) use selector::ContextSelector;

/// Position of a context in the configuration hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextType {
    Engine,
    Main,
    Site,
    Location,
}

impl ContextType {
    pub fn label(self) -> &'static str {
        match self {
            ContextType::Engine => "engine",
            ContextType::Main => "main",
            ContextType::Site => "site",
            ContextType::Location => "location",
        }
    }
}

/// Lifecycle state of a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Created,
    Open,
    Closed,
}

impl ContextState {
    fn label(self) -> &'static str {
        match self {
            ContextState::Created => "created",
            ContextState::Open => "open",
            ContextState::Closed => "closed",
        }
    }
}

/// A value in a context's named setting overlay.
#[derive(Clone, Debug, PartialEq)]
pub enum CfgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// A named node in the configuration tree.
pub struct Context {
    id: CtxId,
    parent: Option<CtxId>,
    pub(crate) children: Vec<CtxId>,
    ctype: ContextType,
    name: String,
    pub(crate) state: ContextState,
    pub(crate) arena: Arena,
    module_config: ModuleConfigSlots,
    cfgmap: CaseMap<CfgValue>,
    pub(crate) auditlog: AuditLogSettings,
    site: Option<SiteId>,
    location: Option<LocationId>,
    working_dir: Option<PathBuf>,
}

impl Context {
    pub fn id(&self) -> CtxId {
        self.id
    }

    pub fn parent(&self) -> Option<CtxId> {
        self.parent
    }

    pub fn children(&self) -> &[CtxId] {
        &self.children
    }

    pub fn context_type(&self) -> ContextType {
        self.ctype
    }

    /// Instance name, e.g. `www` for `site:www`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `type:name` form used in diagnostics.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.ctype.label(), self.name)
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ContextState::Open
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn auditlog(&self) -> &AuditLogSettings {
        &self.auditlog
    }

    /// Audit settings are only adjustable while the context is open.
    pub fn auditlog_mut(&mut self) -> Result<&mut AuditLogSettings, ContextError> {
        self.ensure_open()?;
        Ok(&mut self.auditlog)
    }

    pub fn site(&self) -> Option<SiteId> {
        self.site
    }

    pub fn location(&self) -> Option<LocationId> {
        self.location
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = Some(dir.into());
    }

    pub fn cfg_get(&self, name: &str) -> Option<&CfgValue> {
        self.cfgmap.get(name)
    }

    /// Set a named configuration value. Fails when the context is not
    /// open.
    pub fn cfg_set(&mut self, name: &str, value: CfgValue) -> Result<(), ContextError> {
        self.ensure_open()?;
        self.cfgmap.insert(name, value);
        Ok(())
    }

    pub fn cfg_iter(&self) -> impl Iterator<Item = (&str, &CfgValue)> {
        self.cfgmap.iter()
    }

    pub fn module_config(&self) -> &ModuleConfigSlots {
        &self.module_config
    }

    pub fn module_config_mut(&mut self) -> &mut ModuleConfigSlots {
        &mut self.module_config
    }

    fn ensure_open(&self) -> Result<(), ContextError> {
        if self.state == ContextState::Open {
            Ok(())
        } else {
            Err(ContextError::NotOpen {
                context: self.full_name(),
            })
        }
    }
}

impl Engine {
    /// Create the engine and main contexts. Runs once from `Engine::new`,
    /// before any module exists.
    pub(crate) fn bootstrap_contexts(&mut self) {
        debug_assert!(self.contexts.is_empty());
        let engine_id = CtxId(0);
        self.contexts.push(Some(Context {
            id: engine_id,
            parent: None,
            children: Vec::new(),
            ctype: ContextType::Engine,
            name: "engine".to_string(),
            state: ContextState::Open,
            arena: self.config_arena.child("ctx:engine"),
            module_config: ModuleConfigSlots::new(),
            cfgmap: CaseMap::new(),
            auditlog: AuditLogSettings::new(engine_id),
            site: None,
            location: None,
            working_dir: None,
        }));
        self.engine_ctx = engine_id;

        let main_id = CtxId(1);
        let (arena, auditlog) = {
            let engine_ctx = self.contexts[0].as_ref().unwrap();
            (
                engine_ctx.arena.child("ctx:main"),
                AuditLogSettings::inherit(&engine_ctx.auditlog, main_id),
            )
        };
        self.contexts.push(Some(Context {
            id: main_id,
            parent: Some(engine_id),
            children: Vec::new(),
            ctype: ContextType::Main,
            name: "main".to_string(),
            state: ContextState::Open,
            arena,
            module_config: ModuleConfigSlots::new(),
            cfgmap: CaseMap::new(),
            auditlog,
            site: None,
            location: None,
            working_dir: None,
        }));
        self.main_ctx = main_id;
        self.contexts[0].as_mut().unwrap().children.push(main_id);
    }

    /// The root engine context.
    pub fn engine_ctx(&self) -> CtxId {
        self.engine_ctx
    }

    /// The main context, parent of every site and the fallback for
    /// unmatched traffic.
    pub fn main_ctx(&self) -> CtxId {
        self.main_ctx
    }

    pub fn context(&self, id: CtxId) -> Result<&Context, ContextError> {
        self.contexts
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(ContextError::UnknownContext { index: id.0 })
    }

    pub fn context_mut(&mut self, id: CtxId) -> Result<&mut Context, ContextError> {
        self.contexts
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(ContextError::UnknownContext { index: id.0 })
    }

    /// All live contexts, in creation order.
    pub fn context_ids(&self) -> Vec<CtxId> {
        self.contexts
            .iter()
            .filter_map(|slot| slot.as_ref().map(|ctx| ctx.id))
            .collect()
    }

    /// The configuration chain from `id` up to the engine context, most
    /// specific first.
    pub fn context_chain(&self, id: CtxId) -> Vec<CtxId> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(at) = cursor {
            match self.context(at) {
                Ok(ctx) => {
                    chain.push(at);
                    cursor = ctx.parent();
                }
                Err(_) => break,
            }
        }
        chain
    }

    /// Create a context under `parent`. Location contexts require a site
    /// context as parent. The new context starts in the created state;
    /// every registered module's per-context initializer runs on it in
    /// registration order.
    pub fn context_create(
        &mut self,
        parent: CtxId,
        ctype: ContextType,
        name: &str,
    ) -> Result<CtxId, EngineError> {
        self.ensure_configuring()?;
        let id = CtxId(self.contexts.len());
        let (arena, auditlog) = {
            let parent_ctx = self.context(parent)?;
            if ctype == ContextType::Location && parent_ctx.context_type() != ContextType::Site {
                return Err(ContextError::SiteRequired {
                    context: format!("{}:{}", ctype.label(), name),
                }
                .into());
            }
            (
                parent_ctx.arena.child(&format!("ctx:{name}")),
                AuditLogSettings::inherit(&parent_ctx.auditlog, id),
            )
        };
        let working_dir = self.context(parent)?.working_dir.clone();
        self.contexts.push(Some(Context {
            id,
            parent: Some(parent),
            children: Vec::new(),
            ctype,
            name: name.to_owned(),
            state: ContextState::Created,
            arena,
            module_config: ModuleConfigSlots::new(),
            cfgmap: CaseMap::new(),
            auditlog,
            site: None,
            location: None,
            working_dir,
        }));
        self.context_mut(parent)?.children.push(id);

        let ctx = self.contexts[id.0].as_mut().unwrap();
        for (at, module) in self.modules.iter().enumerate() {
            module
                .on_context_create(ctx, ModuleId(at))
                .map_err(|cause| ContextError::ModuleCallbackFailed {
                    module: module.name().to_owned(),
                    context: ctx.full_name(),
                    message: cause.message,
                })?;
        }
        Ok(id)
    }

    /// Open a context for configuration: `created → open`. Non-engine
    /// contexts are pushed on the configuration parser's stack.
    pub fn context_open(&mut self, id: CtxId) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        {
            let ctx = self.context_mut(id)?;
            if ctx.state != ContextState::Created {
                return Err(ContextError::InvalidTransition {
                    context: ctx.full_name(),
                    from: ctx.state.label(),
                    to: ContextState::Open.label(),
                }
                .into());
            }
            ctx.state = ContextState::Open;
        }
        if id != self.engine_ctx {
            self.parser_stack.push(id);
        }
        {
            let ctx = self.contexts[id.0].as_mut().unwrap();
            for (at, module) in self.modules.iter().enumerate() {
                module
                    .on_context_open(ctx, ModuleId(at))
                    .map_err(|cause| ContextError::ModuleCallbackFailed {
                        module: module.name().to_owned(),
                        context: ctx.full_name(),
                        message: cause.message,
                    })?;
            }
        }
        let ctx = self.contexts[id.0].as_ref().unwrap();
        self.fire_ctx(ctx, State::ContextOpen)?;
        Ok(())
    }

    /// Close a context: `open → closed`. Non-engine contexts are popped
    /// off the configuration parser's stack.
    pub fn context_close(&mut self, id: CtxId) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        {
            let ctx = self.context_mut(id)?;
            if ctx.state != ContextState::Open {
                return Err(ContextError::InvalidTransition {
                    context: ctx.full_name(),
                    from: ctx.state.label(),
                    to: ContextState::Closed.label(),
                }
                .into());
            }
            ctx.state = ContextState::Closed;
        }
        {
            let ctx = self.contexts[id.0].as_mut().unwrap();
            for (at, module) in self.modules.iter().enumerate() {
                module
                    .on_context_close(ctx, ModuleId(at))
                    .map_err(|cause| ContextError::ModuleCallbackFailed {
                        module: module.name().to_owned(),
                        context: ctx.full_name(),
                        message: cause.message,
                    })?;
            }
        }
        {
            let ctx = self.contexts[id.0].as_ref().unwrap();
            self.fire_ctx(ctx, State::ContextClose)?;
        }
        if id != self.engine_ctx {
            if self.parser_stack.last() == Some(&id) {
                self.parser_stack.pop();
            } else {
                warn!(
                    "context #{} closed out of parser stack order",
                    id.0
                );
            }
        }
        Ok(())
    }

    /// Destroy a context and, transitively, its children (children go
    /// first, in reverse creation order). Fires `context-destroy` hooks
    /// and module callbacks before the context's arena is released.
    pub fn context_destroy(&mut self, id: CtxId) -> Result<(), EngineError> {
        let children = self.context(id)?.children.clone();
        for child in children.into_iter().rev() {
            if self.context(child).is_ok() {
                self.context_destroy(child)?;
            }
        }
        {
            let ctx = self.contexts[id.0].as_mut().unwrap();
            for (at, module) in self.modules.iter().enumerate() {
                module
                    .on_context_destroy(ctx, ModuleId(at))
                    .map_err(|cause| ContextError::ModuleCallbackFailed {
                        module: module.name().to_owned(),
                        context: ctx.full_name(),
                        message: cause.message,
                    })?;
            }
        }
        {
            let ctx = self.contexts[id.0].as_ref().unwrap();
            self.fire_ctx(ctx, State::ContextDestroy)?;
        }
        let parent = self.contexts[id.0].as_ref().unwrap().parent;
        self.contexts[id.0] = None;
        if let Some(parent) = parent {
            if let Some(Some(parent_ctx)) = self.contexts.get_mut(parent.0) {
                parent_ctx.children.retain(|child| *child != id);
            }
        }
        Ok(())
    }

    /// The context the configuration parser is currently inside: the top
    /// of the block stack, or main outside any block.
    pub fn current_context(&self) -> CtxId {
        self.parser_stack.last().copied().unwrap_or(self.main_ctx)
    }

    /// Enter a configuration block. Equivalent to opening the context;
    /// called by the external parser when it enters a block.
    pub fn block_push(&mut self, ctx: CtxId) -> Result<(), EngineError> {
        self.context_open(ctx)
    }

    /// Close the innermost open configuration block. Called by the
    /// external parser when it leaves a block.
    pub fn block_pop(&mut self) -> Result<CtxId, EngineError> {
        let id = self
            .parser_stack
            .last()
            .copied()
            .ok_or(ContextError::ParserStackEmpty)?;
        self.context_close(id)?;
        Ok(id)
    }

    // Sites

    /// Register a site. Site names are unique, ASCII case-insensitive.
    pub fn site_create(&mut self, name: &str) -> Result<SiteId, EngineError> {
        self.ensure_configuring()?;
        if self.sites.iter().any(|site| site.matches_name(name)) {
            return Err(EngineError::DuplicateName {
                registry: "site",
                name: name.to_owned(),
            });
        }
        let id = SiteId(self.sites.len());
        self.sites.push(Site::new(id, name));
        Ok(id)
    }

    pub fn site(&self, id: SiteId) -> Result<&Site, ContextError> {
        self.sites
            .get(id.0)
            .ok_or(ContextError::UnknownSite { index: id.0 })
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    fn site_mut(&mut self, id: SiteId) -> Result<&mut Site, ContextError> {
        self.sites
            .get_mut(id.0)
            .ok_or(ContextError::UnknownSite { index: id.0 })
    }

    /// Add a literal local-address predicate to a site. A site with no IP
    /// entries matches any address.
    pub fn site_add_ip(&mut self, id: SiteId, ip: &str) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        self.site_mut(id)?.add_ip(ip.into());
        Ok(())
    }

    /// Add a hostname suffix predicate to a site. `*` is the wildcard; a
    /// site with no host entries matches any hostname.
    pub fn site_add_host(&mut self, id: SiteId, host: &str) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        self.site_mut(id)?.add_host(host.into());
        Ok(())
    }

    /// Add a location with a path prefix (`None` matches any path).
    pub fn site_add_location(
        &mut self,
        id: SiteId,
        path: Option<&str>,
    ) -> Result<LocationId, EngineError> {
        self.ensure_configuring()?;
        Ok(self.site_mut(id)?.add_location(path.map(Into::into)))
    }

    /// Declare a site's fallback location.
    pub fn site_set_default_location(
        &mut self,
        id: SiteId,
        location: LocationId,
    ) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        if !self.site_mut(id)?.set_default_location(location) {
            return Err(ContextError::UnknownSite { index: id.0 }.into());
        }
        Ok(())
    }

    /// Tie a context to a site so the built-in selector can route to it.
    pub fn context_bind_site(&mut self, ctx: CtxId, site: SiteId) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        self.site(site)?;
        self.context_mut(ctx)?.site = Some(site);
        Ok(())
    }

    /// Tie a context to a specific location of its site.
    pub fn context_bind_location(
        &mut self,
        ctx: CtxId,
        location: LocationId,
    ) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        self.site(location.site)?
            .location(location)
            .ok_or(ContextError::UnknownSite {
                index: location.site.0,
            })?;
        let ctx = self.context_mut(ctx)?;
        ctx.site = Some(location.site);
        ctx.location = Some(location);
        Ok(())
    }
}
