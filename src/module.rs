use std::any::Any;

use crate::context::Context;
use crate::engine::Engine;
use crate::error::CallbackError;
use crate::types::ModuleId;

/// ABI number modules are built against.
pub const MODULE_ABINUM: u32 = crate::server::ENGINE_ABINUM;

/// An inspection module hosted by the engine.
///
/// A module is registered during the configuration window and receives a
/// [`ModuleId`] slot ordinal; that ordinal addresses the module's opaque
/// data in every per-context, per-connection and per-transaction slot
/// array. `init` runs once at registration and is where the module
/// registers its hooks, directives and stream processors.
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    fn abinum(&self) -> u32 {
        MODULE_ABINUM
    }

    /// Called once when the module is registered, before it is stored.
    fn init(&self, engine: &mut Engine, id: ModuleId) -> Result<(), CallbackError> {
        let _ = (engine, id);
        Ok(())
    }

    /// Called for each non-engine context when it is created (and, for
    /// contexts that already exist when the module is registered, at
    /// registration time).
    fn on_context_create(&self, ctx: &mut Context, id: ModuleId) -> Result<(), CallbackError> {
        let _ = (ctx, id);
        Ok(())
    }

    fn on_context_open(&self, ctx: &mut Context, id: ModuleId) -> Result<(), CallbackError> {
        let _ = (ctx, id);
        Ok(())
    }

    fn on_context_close(&self, ctx: &mut Context, id: ModuleId) -> Result<(), CallbackError> {
        let _ = (ctx, id);
        Ok(())
    }

    fn on_context_destroy(&self, ctx: &mut Context, id: ModuleId) -> Result<(), CallbackError> {
        let _ = (ctx, id);
        Ok(())
    }
}

/// Per-entity opaque module data, indexed by the module's slot ordinal.
/// Connections and transactions each carry one.
#[derive(Default)]
pub struct ModuleSlots {
    slots: Vec<Option<Box<dyn Any + Send>>>,
}

impl ModuleSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Any + Send>(&mut self, id: ModuleId, data: T) {
        let at = id.index();
        if at >= self.slots.len() {
            self.slots.resize_with(at + 1, || None);
        }
        self.slots[at] = Some(Box::new(data));
    }

    pub fn get<T: Any>(&self, id: ModuleId) -> Option<&T> {
        self.slots
            .get(id.index())?
            .as_ref()?
            .downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, id: ModuleId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())?
            .as_mut()?
            .downcast_mut::<T>()
    }

    pub fn take<T: Any>(&mut self, id: ModuleId) -> Option<Box<T>> {
        let slot = self.slots.get_mut(id.index())?;
        match slot.take() {
            Some(data) => match data.downcast::<T>() {
                Ok(data) => Some(data),
                Err(data) => {
                    // wrong type requested; put it back untouched
                    *slot = Some(data);
                    None
                }
            },
            None => None,
        }
    }
}

/// Per-context module configuration data. Shared read-only across the
/// threads driving traffic, so the payload must also be `Sync`.
#[derive(Default)]
pub struct ModuleConfigSlots {
    slots: Vec<Option<Box<dyn Any + Send + Sync>>>,
}

impl ModuleConfigSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Any + Send + Sync>(&mut self, id: ModuleId, data: T) {
        let at = id.index();
        if at >= self.slots.len() {
            self.slots.resize_with(at + 1, || None);
        }
        self.slots[at] = Some(Box::new(data));
    }

    pub fn get<T: Any>(&self, id: ModuleId) -> Option<&T> {
        self.slots
            .get(id.index())?
            .as_ref()?
            .downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, id: ModuleId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())?
            .as_mut()?
            .downcast_mut::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_grow_on_demand() {
        let mut slots = ModuleSlots::new();
        slots.set(ModuleId(3), 7u32);
        assert_eq!(slots.get::<u32>(ModuleId(3)), Some(&7));
        assert_eq!(slots.get::<u32>(ModuleId(0)), None);
    }

    #[test]
    fn typed_access_checks_the_stored_type() {
        let mut slots = ModuleSlots::new();
        slots.set(ModuleId(0), "state".to_string());
        assert_eq!(slots.get::<u32>(ModuleId(0)), None);
        assert_eq!(slots.get::<String>(ModuleId(0)).map(String::as_str), Some("state"));
    }

    #[test]
    fn take_with_wrong_type_leaves_slot_intact() {
        let mut slots = ModuleSlots::new();
        slots.set(ModuleId(1), 5u64);
        assert!(slots.take::<String>(ModuleId(1)).is_none());
        assert_eq!(slots.take::<u64>(ModuleId(1)).as_deref(), Some(&5));
        assert!(slots.take::<u64>(ModuleId(1)).is_none());
    }
}
