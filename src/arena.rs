use std::sync::Mutex;

use crate::bytestr::ByteStr;

/// A scoped allocation domain.
///
/// Every engine, context, connection and transaction owns one. Allocations
/// made through an arena are retained by its ledger, so any [`ByteStr`]
/// handed out stays valid at least as long as the arena itself; dropping the
/// arena releases everything it retained in bulk. Domains nest: a child
/// arena is owned by the child entity, and dropping the parent entity drops
/// the child arena with it.
///
/// A single arena is meant to be driven by one thread at a time (the same
/// thread that drives its owning entity); the interior lock only serializes
/// the accounting so that engine-owned arenas can be reached through a
/// shared engine reference.
pub struct Arena {
    label: String,
    lineage: String,
    depth: usize,
    ledger: Mutex<Ledger>,
}

#[derive(Default)]
struct Ledger {
    held: Vec<ByteStr>,
    bytes: usize,
    children: usize,
}

impl Arena {
    /// Create a root domain.
    pub fn root(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            lineage: label.to_owned(),
            depth: 0,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Create a child domain of this one.
    pub fn child(&self, label: &str) -> Arena {
        let mut ledger = self.lock();
        ledger.children += 1;
        Arena {
            label: label.to_owned(),
            lineage: format!("{}/{}", self.lineage, label),
            depth: self.depth + 1,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Copy `data` into the domain.
    pub fn alloc_bytes(&self, data: &[u8]) -> ByteStr {
        self.retain(ByteStr::copy_from(data))
    }

    /// Copy a string into the domain. The `strdup` of this allocator.
    pub fn alloc_str(&self, s: &str) -> ByteStr {
        self.retain(ByteStr::copy_from(s.as_bytes()))
    }

    /// Allocate `len` zeroed bytes. The `calloc` of this allocator.
    pub fn alloc_zeroed(&self, len: usize) -> ByteStr {
        self.retain(ByteStr::from(vec![0u8; len]))
    }

    /// Retain an existing byte string so it lives as long as this domain.
    pub fn retain(&self, bytes: ByteStr) -> ByteStr {
        let mut ledger = self.lock();
        ledger.bytes += bytes.len();
        ledger.held.push(bytes.clone());
        bytes
    }

    /// Total bytes allocated into this domain (children not included).
    pub fn bytes_allocated(&self) -> usize {
        self.lock().bytes
    }

    /// Number of allocations retained by this domain.
    pub fn allocation_count(&self) -> usize {
        self.lock().held.len()
    }

    /// Number of child domains created from this one.
    pub fn children_created(&self) -> usize {
        self.lock().children
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Slash-separated path of labels from the root domain down to this one.
    pub fn lineage(&self) -> &str {
        &self.lineage
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ledger> {
        match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.lock();
        f.debug_struct("Arena")
            .field("lineage", &self.lineage)
            .field("allocations", &ledger.held.len())
            .field("bytes", &ledger.bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accounting_tracks_allocations() {
        let arena = Arena::root("engine");
        arena.alloc_str("hello");
        arena.alloc_bytes(b"world!");
        assert_eq!(arena.allocation_count(), 2);
        assert_eq!(arena.bytes_allocated(), 11);
    }

    #[test]
    fn children_nest_and_record_lineage() {
        let root = Arena::root("engine");
        let conn = root.child("conn");
        let tx = conn.child("tx");
        assert_eq!(tx.lineage(), "engine/conn/tx");
        assert_eq!(tx.depth(), 2);
        assert_eq!(root.children_created(), 1);
        assert_eq!(conn.children_created(), 1);
    }

    #[test]
    fn handles_outlive_use_sites_while_arena_lives() {
        let arena = Arena::root("tx");
        let s = arena.alloc_str("GET");
        let t = s.clone();
        drop(s);
        assert_eq!(t.as_bytes(), b"GET");
        assert_eq!(arena.allocation_count(), 1);
    }

    #[test]
    fn alloc_zeroed_is_zeroed() {
        let arena = Arena::root("tx");
        let z = arena.alloc_zeroed(8);
        assert_eq!(z.as_bytes(), &[0u8; 8]);
    }
}
