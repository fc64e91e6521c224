/// Slot index assigned to a module when it is registered with the engine.
/// Used to address the module's opaque data in every per-context,
/// per-connection and per-transaction slot array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a configuration context owned by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CtxId(pub(crate) usize);

impl CtxId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a site registered with the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SiteId(pub(crate) usize);

/// Handle to a location within a site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocationId {
    pub(crate) site: SiteId,
    pub(crate) index: usize,
}

/// Identifier of a connection created by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnId(pub(crate) u64);

impl ConnId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Identifier of a transaction. 128 random bits, generated at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxId(pub(crate) u128);

impl TxId {
    pub fn value(&self) -> u128 {
        self.0
    }
}

/// Direction of a body stream or header operation within a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn invert(self) -> Self {
        match self {
            Direction::Request => Direction::Response,
            Direction::Response => Direction::Request,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Request => "request",
            Direction::Response => "response",
        }
    }
}
