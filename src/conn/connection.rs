use std::time::Instant;

use log::error;

use crate::arena::Arena;
use crate::bytestr::ByteStr;
use crate::conn::Transaction;
use crate::module::ModuleSlots;
use crate::types::{ConnId, CtxId, TxId};

/// Monotonic connection flags. Once set, a flag is never cleared for the
/// lifetime of the connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnFlags(u32);

impl ConnFlags {
    /// The internal `conn-started` state has fired.
    pub const STARTED: ConnFlags = ConnFlags(1 << 0);
    /// The host signalled `conn-opened`.
    pub const OPENED: ConnFlags = ConnFlags(1 << 1);
    /// At least one inbound data chunk was seen.
    pub const SEEN_DATA_IN: ConnFlags = ConnFlags(1 << 2);
    /// At least one outbound data chunk was seen.
    pub const SEEN_DATA_OUT: ConnFlags = ConnFlags(1 << 3);
    /// The host signalled `conn-closed`.
    pub const CLOSED: ConnFlags = ConnFlags(1 << 4);
    /// The `conn-finished` state has fired.
    pub const FINISHED: ConnFlags = ConnFlags(1 << 5);

    pub fn contains(self, other: ConnFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn insert(&mut self, other: ConnFlags) {
        self.0 |= other.0;
    }
}

/// A connection owned by the host and inspected by the engine.
///
/// The connection exclusively owns its transaction queue; transactions are
/// appended in arrival order and addressed by [`TxId`]. A single host
/// thread drives a connection at a time.
pub struct Connection {
    id: ConnId,
    pub(crate) arena: Arena,
    ctx: CtxId,
    remote_ip: ByteStr,
    remote_port: u16,
    local_ip: ByteStr,
    local_port: u16,
    pub(crate) flags: ConnFlags,
    created_at: Instant,
    opened_at: Option<Instant>,
    closed_at: Option<Instant>,
    module_data: ModuleSlots,
    pub(crate) txs: Vec<Transaction>,
    tx_total: u64,
}

impl Connection {
    pub(crate) fn new(
        id: ConnId,
        arena: Arena,
        ctx: CtxId,
        remote_ip: ByteStr,
        remote_port: u16,
        local_ip: ByteStr,
        local_port: u16,
    ) -> Self {
        Self {
            id,
            arena,
            ctx,
            remote_ip,
            remote_port,
            local_ip,
            local_port,
            flags: ConnFlags::default(),
            created_at: Instant::now(),
            opened_at: None,
            closed_at: None,
            module_data: ModuleSlots::new(),
            txs: Vec::new(),
            tx_total: 0,
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// The configuration context this connection is bound to.
    pub fn ctx(&self) -> CtxId {
        self.ctx
    }

    pub(crate) fn bind_ctx(&mut self, ctx: CtxId) {
        self.ctx = ctx;
    }

    pub fn remote_ip(&self) -> &ByteStr {
        &self.remote_ip
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn local_ip(&self) -> &ByteStr {
        &self.local_ip
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn flags(&self) -> ConnFlags {
        self.flags
    }

    pub fn is_opened(&self) -> bool {
        self.flags.contains(ConnFlags::OPENED)
    }

    pub fn saw_data_in(&self) -> bool {
        self.flags.contains(ConnFlags::SEEN_DATA_IN)
    }

    pub fn saw_data_out(&self) -> bool {
        self.flags.contains(ConnFlags::SEEN_DATA_OUT)
    }

    pub fn is_closed(&self) -> bool {
        self.flags.contains(ConnFlags::CLOSED)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<Instant> {
        self.closed_at
    }

    pub(crate) fn mark_opened(&mut self) {
        self.flags.insert(ConnFlags::OPENED);
        if self.opened_at.is_none() {
            self.opened_at = Some(Instant::now());
        }
    }

    pub(crate) fn mark_closed(&mut self) {
        self.flags.insert(ConnFlags::CLOSED);
        if self.closed_at.is_none() {
            self.closed_at = Some(Instant::now());
        }
    }

    pub fn module_data(&self) -> &ModuleSlots {
        &self.module_data
    }

    pub fn module_data_mut(&mut self) -> &mut ModuleSlots {
        &mut self.module_data
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    // Transaction queue

    /// Total transactions ever created on this connection.
    pub fn tx_total(&self) -> u64 {
        self.tx_total
    }

    /// Transactions currently in the queue.
    pub fn tx_count(&self) -> usize {
        self.txs.len()
    }

    pub fn tx(&self, id: TxId) -> Option<&Transaction> {
        self.txs.iter().find(|tx| tx.id() == id)
    }

    pub fn tx_mut(&mut self, id: TxId) -> Option<&mut Transaction> {
        self.txs.iter_mut().find(|tx| tx.id() == id)
    }

    pub fn first_tx(&self) -> Option<&Transaction> {
        self.txs.first()
    }

    pub fn last_tx(&self) -> Option<&Transaction> {
        self.txs.last()
    }

    /// The transaction currently being processed: the first one in the
    /// queue that has not finished, or the last one when all have.
    pub fn current_tx(&self) -> Option<&Transaction> {
        self.txs
            .iter()
            .find(|tx| !tx.is_finished())
            .or_else(|| self.txs.last())
    }

    pub fn current_tx_mut(&mut self) -> Option<&mut Transaction> {
        let at = self
            .txs
            .iter()
            .position(|tx| !tx.is_finished())
            .or_else(|| self.txs.len().checked_sub(1))?;
        self.txs.get_mut(at)
    }

    /// Append a transaction to the queue. Appending the second transaction
    /// marks both the first and the new one as pipelined.
    pub(crate) fn push_tx(&mut self, mut tx: Transaction) -> TxId {
        if let Some(first) = self.txs.first_mut() {
            first.mark_pipelined();
            tx.mark_pipelined();
        }
        let id = tx.id();
        self.txs.push(tx);
        self.tx_total += 1;
        id
    }

    /// Remove a transaction from the queue. Destroying a transaction that
    /// is not in its connection's queue is a programming error.
    pub fn destroy_tx(&mut self, id: TxId) -> Option<Transaction> {
        match self.txs.iter().position(|tx| tx.id() == id) {
            Some(at) => Some(self.txs.remove(at)),
            None => {
                debug_assert!(false, "transaction {id:?} is not in connection {:?}", self.id);
                error!(
                    "attempted to destroy transaction {:?} not owned by connection {:?}",
                    id, self.id
                );
                None
            }
        }
    }
}
