use log::debug;

use crate::conn::{Connection, Transaction};
use crate::context::ContextError;
use crate::engine::Engine;
use crate::error::{CallbackError, EngineError};
use crate::types::CtxId;

/// What a selector predicate is asked to match: a connection at
/// `conn-opened` time, or a transaction once its request header is
/// complete.
pub enum SelectorTarget<'a> {
    Conn(&'a Connection),
    Tx(&'a Transaction),
}

impl SelectorTarget<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            SelectorTarget::Conn(_) => "conn",
            SelectorTarget::Tx(_) => "tx",
        }
    }
}

/// A selector predicate: `Ok(true)` binds the selector's context,
/// `Ok(false)` passes to the next selector, an error aborts the binding.
pub type SelectorFn =
    Box<dyn Fn(&Engine, &SelectorTarget<'_>) -> Result<bool, CallbackError> + Send + Sync>;

pub(crate) struct ContextSelector {
    pub(crate) ctx: CtxId,
    pub(crate) name: String,
    pub(crate) predicate: SelectorFn,
}

impl Engine {
    /// Register a selector that can bind `ctx` to live traffic. Selectors
    /// are consulted in registration order; the first to accept wins.
    pub fn register_context_selector<F>(
        &mut self,
        ctx: CtxId,
        name: &str,
        predicate: F,
    ) -> Result<(), EngineError>
    where
        F: Fn(&Engine, &SelectorTarget<'_>) -> Result<bool, CallbackError> + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        self.context(ctx)?;
        self.selectors.push(ContextSelector {
            ctx,
            name: name.to_owned(),
            predicate: Box::new(predicate),
        });
        Ok(())
    }

    /// Register the built-in site/location selector for `ctx`.
    ///
    /// The context must be bound to a site (and optionally one of its
    /// locations). The predicate declines connections, and matches a
    /// transaction when the site's IP list is empty or contains the local
    /// address, the site's host list is empty or has a suffix match for
    /// the hostname (`*` alone matches an empty hostname), and the
    /// location's path is absent or a prefix of the request path.
    pub fn register_site_selector(&mut self, ctx: CtxId) -> Result<(), EngineError> {
        self.ensure_configuring()?;
        let (site, location, name) = {
            let ctx = self.context(ctx)?;
            let site = ctx.site().ok_or(ContextError::SiteNotBound {
                context: ctx.full_name(),
            })?;
            (site, ctx.location(), ctx.full_name())
        };
        self.selectors.push(ContextSelector {
            ctx,
            name,
            predicate: Box::new(move |engine, target| {
                let tx = match target {
                    SelectorTarget::Tx(tx) => tx,
                    // connections do not pick a site or location
                    SelectorTarget::Conn(_) => return Ok(false),
                };
                let site = engine
                    .site(site)
                    .map_err(|cause| CallbackError::new(cause.to_string()))?;
                if !site.ip_matches(tx.local_ip()) {
                    return Ok(false);
                }
                if !site.host_matches(tx.hostname()) {
                    return Ok(false);
                }
                let Some(location) = location else {
                    return Ok(true);
                };
                let location = site
                    .location(location)
                    .ok_or_else(|| CallbackError::new("location missing from site"))?;
                Ok(match location.path() {
                    None => true,
                    Some(path) if path.is_empty() => true,
                    Some(path) => tx.path().starts_with(path),
                })
            }),
        });
        Ok(())
    }

    /// Bind `target` to a context: the first selector whose predicate
    /// accepts wins, and the main context is the fallback.
    pub(crate) fn select_context(
        &self,
        target: &SelectorTarget<'_>,
    ) -> Result<CtxId, ContextError> {
        for selector in &self.selectors {
            match (selector.predicate)(self, target) {
                Ok(true) => {
                    debug!(
                        "selector `{}` bound {} to context #{}",
                        selector.name,
                        target.kind(),
                        selector.ctx.0
                    );
                    return Ok(selector.ctx);
                }
                Ok(false) => continue,
                Err(cause) => {
                    return Err(ContextError::SelectorFailed {
                        name: selector.name.clone(),
                        message: cause.message,
                    });
                }
            }
        }
        Ok(self.main_ctx)
    }
}
