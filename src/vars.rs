use std::collections::HashMap;
use std::sync::Arc;

use crate::bytestr::ByteStr;
use crate::case_map::CaseMap;

/// A typed value held in a transaction's variable store.
#[derive(Clone, Debug, PartialEq)]
pub enum VarValue {
    Int(i64),
    Float(f64),
    Str(ByteStr),
    List(Vec<VarValue>),
}

impl From<i64> for VarValue {
    fn from(v: i64) -> Self {
        VarValue::Int(v)
    }
}

impl From<f64> for VarValue {
    fn from(v: f64) -> Self {
        VarValue::Float(v)
    }
}

impl From<ByteStr> for VarValue {
    fn from(v: ByteStr) -> Self {
        VarValue::Str(v)
    }
}

impl From<&str> for VarValue {
    fn from(v: &str) -> Self {
        VarValue::Str(ByteStr::from(v))
    }
}

/// Dense key for a variable registered at configuration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarKey(pub(crate) usize);

/// Engine-level registry of variable names.
///
/// Modules register the variables they publish during the configuration
/// window and get back a dense [`VarKey`]; per-transaction stores back
/// registered keys with a slot vector so the hot path never hashes. Names
/// are ASCII case-insensitive. Unregistered names still work through each
/// store's dynamic overlay.
#[derive(Default)]
pub struct VarRegistry {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl VarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, or return the existing key if it is already
    /// registered under any casing.
    pub fn register(&mut self, name: &str) -> VarKey {
        let folded = name.to_ascii_lowercase();
        if let Some(&at) = self.index.get(&folded) {
            return VarKey(at);
        }
        let at = self.names.len();
        self.names.push(name.to_owned());
        self.index.insert(folded, at);
        VarKey(at)
    }

    pub fn lookup(&self, name: &str) -> Option<VarKey> {
        self.index.get(&name.to_ascii_lowercase()).map(|&at| VarKey(at))
    }

    pub fn name(&self, key: VarKey) -> Option<&str> {
        self.names.get(key.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Per-transaction typed key/value store exposed to modules.
pub struct VarStore {
    registry: Arc<VarRegistry>,
    dense: Vec<Option<VarValue>>,
    dynamic: CaseMap<VarValue>,
}

impl VarStore {
    pub(crate) fn new(registry: Arc<VarRegistry>) -> Self {
        let dense = (0..registry.len()).map(|_| None).collect();
        Self {
            registry,
            dense,
            dynamic: CaseMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&VarValue> {
        match self.registry.lookup(name) {
            Some(key) => self.get_key(key),
            None => self.dynamic.get(name),
        }
    }

    pub fn set(&mut self, name: &str, value: impl Into<VarValue>) {
        match self.registry.lookup(name) {
            Some(key) => self.set_key(key, value),
            None => {
                self.dynamic.insert(name, value.into());
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<VarValue> {
        match self.registry.lookup(name) {
            Some(key) => self.dense.get_mut(key.0)?.take(),
            None => self.dynamic.remove(name),
        }
    }

    pub fn get_key(&self, key: VarKey) -> Option<&VarValue> {
        self.dense.get(key.0)?.as_ref()
    }

    pub fn set_key(&mut self, key: VarKey, value: impl Into<VarValue>) {
        if let Some(slot) = self.dense.get_mut(key.0) {
            *slot = Some(value.into());
        }
    }

    /// Iterate all set variables: registered ones first in key order, then
    /// dynamic ones in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarValue)> {
        let registered = self
            .dense
            .iter()
            .enumerate()
            .filter_map(|(at, slot)| match slot {
                Some(value) => Some((self.registry.name(VarKey(at)).unwrap_or(""), value)),
                None => None,
            });
        registered.chain(self.dynamic.iter())
    }

    pub fn len(&self) -> usize {
        self.dense.iter().filter(|slot| slot.is_some()).count() + self.dynamic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
