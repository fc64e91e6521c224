use std::collections::HashMap;

use crate::conn::Transaction;
use crate::error::CallbackError;
use crate::stream::{StreamError, StreamIo};
use crate::types::Direction;

/// A streaming filter instantiated per transaction and per direction.
///
/// `execute` pops segments from the io queue, processes them and puts zero
/// or more segments back for the next processor. Dropping the instance is
/// the destroy callback. Processors must not block; an error aborts the
/// push it happened in.
pub trait StreamProcessor: Send {
    fn execute(&mut self, tx: &mut Transaction, io: &mut StreamIo) -> Result<(), CallbackError>;
}

/// Builds one processor instance for a transaction's pump.
pub type StreamProcessorFactory =
    Box<dyn Fn(&Transaction, Direction) -> Box<dyn StreamProcessor> + Send + Sync>;

/// A named stream processor registration.
pub struct StreamProcessorDef {
    name: String,
    types: Vec<String>,
    factory: StreamProcessorFactory,
}

impl StreamProcessorDef {
    /// `types` names the stream types this processor applies to
    /// (the built-in capture processor applies to `raw`).
    pub fn new(
        name: impl Into<String>,
        types: Vec<String>,
        factory: StreamProcessorFactory,
    ) -> Self {
        Self {
            name: name.into(),
            types,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub(crate) fn instantiate(
        &self,
        tx: &Transaction,
        direction: Direction,
    ) -> Box<dyn StreamProcessor> {
        (self.factory)(tx, direction)
    }
}

/// Engine-level registry of stream processor definitions. Populated during
/// the configuration window, read-only afterwards.
#[derive(Default)]
pub struct StreamProcessorRegistry {
    defs: Vec<StreamProcessorDef>,
    by_name: HashMap<String, usize>,
}

impl StreamProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: StreamProcessorDef) -> Result<(), StreamError> {
        let folded = def.name().to_ascii_lowercase();
        if self.by_name.contains_key(&folded) {
            return Err(StreamError::DuplicateProcessor {
                name: def.name().to_owned(),
            });
        }
        self.by_name.insert(folded, self.defs.len());
        self.defs.push(def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&StreamProcessorDef> {
        let &at = self.by_name.get(&name.to_ascii_lowercase())?;
        self.defs.get(at)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub(crate) fn instantiate(
        &self,
        name: &str,
        tx: &Transaction,
        direction: Direction,
    ) -> Result<Box<dyn StreamProcessor>, StreamError> {
        match self.get(name) {
            Some(def) => Ok(def.instantiate(tx, direction)),
            None => Err(StreamError::UnknownProcessor {
                name: name.to_owned(),
            }),
        }
    }
}
