use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::arena::Arena;
use crate::block::BlockInfo;
use crate::bytestr::ByteStr;
use crate::conn::{Header, RequestLine, ResponseLine};
use crate::hooks::State;
use crate::module::ModuleSlots;
use crate::stream::StreamPump;
use crate::types::{ConnId, CtxId, Direction, TxId};
use crate::vars::{VarRegistry, VarStore};

/// Monotonic transaction flags. Once set, a flag is never cleared until
/// the transaction is destroyed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxFlags(u32);

impl TxFlags {
    pub const TX_STARTED: TxFlags = TxFlags(1 << 0);
    pub const REQ_STARTED: TxFlags = TxFlags(1 << 1);
    /// A request line was delivered.
    pub const REQ_LINE: TxFlags = TxFlags(1 << 2);
    /// At least one request header chunk was delivered.
    pub const REQ_HEADER_DATA: TxFlags = TxFlags(1 << 3);
    /// The request header is complete.
    pub const REQ_HEADER: TxFlags = TxFlags(1 << 4);
    /// At least one request body chunk was delivered.
    pub const REQ_BODY: TxFlags = TxFlags(1 << 5);
    pub const REQ_FINISHED: TxFlags = TxFlags(1 << 6);
    pub const RES_STARTED: TxFlags = TxFlags(1 << 7);
    pub const RES_LINE: TxFlags = TxFlags(1 << 8);
    pub const RES_HEADER_DATA: TxFlags = TxFlags(1 << 9);
    pub const RES_HEADER: TxFlags = TxFlags(1 << 10);
    pub const RES_BODY: TxFlags = TxFlags(1 << 11);
    pub const RES_FINISHED: TxFlags = TxFlags(1 << 12);
    pub const POSTPROCESS: TxFlags = TxFlags(1 << 13);
    pub const LOGGING: TxFlags = TxFlags(1 << 14);
    pub const TX_FINISHED: TxFlags = TxFlags(1 << 15);
    /// A block was requested for this transaction.
    pub const BLOCKED: TxFlags = TxFlags(1 << 16);
    /// Some request data (line, header or body) was seen.
    pub const HAS_REQ_DATA: TxFlags = TxFlags(1 << 17);
    /// Some response data was seen.
    pub const HAS_RES_DATA: TxFlags = TxFlags(1 << 18);
    /// The request line carried no protocol token.
    pub const HTTP09: TxFlags = TxFlags(1 << 19);
    /// This transaction shares its connection with another one.
    pub const PIPELINED: TxFlags = TxFlags(1 << 20);

    pub fn contains(self, other: TxFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn insert(&mut self, other: TxFlags) {
        self.0 |= other.0;
    }
}

/// Body bytes captured for later inspection, bounded by the configured
/// log limit. Bytes past the limit are counted but not stored.
pub struct BodyCapture {
    data: Vec<u8>,
    limit: usize,
}

impl BodyCapture {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// Copy as much of `bytes` as the limit allows.
    pub(crate) fn absorb(&mut self, bytes: &[u8]) {
        let room = self.limit.saturating_sub(self.data.len());
        let take = room.min(bytes.len());
        self.data.extend_from_slice(&bytes[..take]);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// A single request/response exchange on a connection.
pub struct Transaction {
    id: TxId,
    conn_id: ConnId,
    pub(crate) arena: Arena,
    ctx: CtxId,
    remote_ip: ByteStr,
    remote_port: u16,
    local_ip: ByteStr,
    local_port: u16,
    hostname: ByteStr,
    path: ByteStr,
    pub(crate) flags: TxFlags,
    blocking_mode: bool,
    times: HashMap<State, Instant>,
    request_line: Option<RequestLine>,
    response_line: Option<ResponseLine>,
    request_headers: Vec<Header>,
    request_header_len: u64,
    response_headers: Vec<Header>,
    response_header_len: u64,
    request_body: BodyCapture,
    response_body: BodyCapture,
    request_body_len: u64,
    response_body_len: u64,
    vars: VarStore,
    module_data: ModuleSlots,
    pub(crate) request_pump: StreamPump,
    pub(crate) response_pump: StreamPump,
    block_info: Option<BlockInfo>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        conn_id: ConnId,
        arena: Arena,
        ctx: CtxId,
        remote_ip: ByteStr,
        remote_port: u16,
        local_ip: ByteStr,
        local_port: u16,
        vars: Arc<VarRegistry>,
        request_body_limit: usize,
        response_body_limit: usize,
        blocking_mode: bool,
    ) -> Self {
        Self {
            id: TxId(fastrand::u128(..)),
            conn_id,
            arena,
            ctx,
            remote_ip,
            remote_port,
            local_ip,
            local_port,
            hostname: ByteStr::empty(),
            path: ByteStr::empty(),
            flags: TxFlags::default(),
            blocking_mode,
            times: HashMap::new(),
            request_line: None,
            response_line: None,
            request_headers: Vec::new(),
            request_header_len: 0,
            response_headers: Vec::new(),
            response_header_len: 0,
            request_body: BodyCapture::new(request_body_limit),
            response_body: BodyCapture::new(response_body_limit),
            request_body_len: 0,
            response_body_len: 0,
            vars: VarStore::new(vars),
            module_data: ModuleSlots::new(),
            request_pump: StreamPump::empty(),
            response_pump: StreamPump::empty(),
            block_info: None,
        }
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    /// The configuration context this transaction is bound to. Starts at
    /// its connection's context and is rebound once the request header is
    /// complete.
    pub fn ctx(&self) -> CtxId {
        self.ctx
    }

    pub(crate) fn bind_ctx(&mut self, ctx: CtxId) {
        self.ctx = ctx;
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
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

    /// Hostname this transaction addresses, taken from the Host header
    /// once the request header completes (hosts may set it earlier).
    pub fn hostname(&self) -> &ByteStr {
        &self.hostname
    }

    pub fn set_hostname(&mut self, hostname: impl Into<ByteStr>) {
        self.hostname = hostname.into();
    }

    /// Path component of the request URI.
    pub fn path(&self) -> &ByteStr {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<ByteStr>) {
        self.path = path.into();
    }

    // Flags

    pub fn flags(&self) -> TxFlags {
        self.flags
    }

    pub fn is_started(&self) -> bool {
        self.flags.contains(TxFlags::TX_STARTED)
    }

    pub fn is_finished(&self) -> bool {
        self.flags.contains(TxFlags::TX_FINISHED)
    }

    pub fn is_pipelined(&self) -> bool {
        self.flags.contains(TxFlags::PIPELINED)
    }

    pub fn is_http09(&self) -> bool {
        self.flags.contains(TxFlags::HTTP09)
    }

    pub fn is_blocked(&self) -> bool {
        self.flags.contains(TxFlags::BLOCKED)
    }

    pub fn has_request_data(&self) -> bool {
        self.flags.contains(TxFlags::HAS_REQ_DATA)
    }

    pub fn has_response_data(&self) -> bool {
        self.flags.contains(TxFlags::HAS_RES_DATA)
    }

    pub fn saw_request_header(&self) -> bool {
        self.flags.contains(TxFlags::REQ_HEADER)
    }

    pub fn saw_request_finished(&self) -> bool {
        self.flags.contains(TxFlags::REQ_FINISHED)
    }

    pub fn saw_response_header(&self) -> bool {
        self.flags.contains(TxFlags::RES_HEADER)
    }

    pub fn saw_response_finished(&self) -> bool {
        self.flags.contains(TxFlags::RES_FINISHED)
    }

    pub(crate) fn mark_pipelined(&mut self) {
        self.flags.insert(TxFlags::PIPELINED);
    }

    // Timestamps

    /// Record the timestamp for a phase. Only the first call per phase
    /// sticks, so streaming phases keep their start time.
    pub(crate) fn record_time(&mut self, state: State) {
        self.times.entry(state).or_insert_with(Instant::now);
    }

    pub fn time_of(&self, state: State) -> Option<Instant> {
        self.times.get(&state).copied()
    }

    // Request data

    pub fn request_line(&self) -> Option<&RequestLine> {
        self.request_line.as_ref()
    }

    pub(crate) fn set_request_line(&mut self, line: RequestLine) {
        self.path = line.path_component();
        self.request_line = Some(line);
    }

    pub fn request_headers(&self) -> &[Header] {
        &self.request_headers
    }

    /// First request header with the given name, ASCII case-insensitive.
    pub fn request_header(&self, name: &str) -> Option<&ByteStr> {
        self.request_headers
            .iter()
            .find(|h| h.name.eq_nocase(name.as_bytes()))
            .map(|h| &h.value)
    }

    /// Running total of request header bytes delivered.
    pub fn request_header_len(&self) -> u64 {
        self.request_header_len
    }

    pub(crate) fn append_request_headers(&mut self, headers: &[Header]) {
        for header in headers {
            self.request_header_len += header.wire_len();
            self.request_headers.push(header.clone());
        }
    }

    /// Captured request body bytes (bounded by the log limit).
    pub fn request_body(&self) -> &BodyCapture {
        &self.request_body
    }

    /// Running total of request body bytes delivered, metered before the
    /// capture limit applies.
    pub fn request_body_len(&self) -> u64 {
        self.request_body_len
    }

    pub(crate) fn meter_request_body(&mut self, len: usize) {
        self.request_body_len += len as u64;
    }

    // Response data

    pub fn response_line(&self) -> Option<&ResponseLine> {
        self.response_line.as_ref()
    }

    pub(crate) fn set_response_line(&mut self, line: ResponseLine) {
        self.response_line = Some(line);
    }

    pub fn response_headers(&self) -> &[Header] {
        &self.response_headers
    }

    pub fn response_header(&self, name: &str) -> Option<&ByteStr> {
        self.response_headers
            .iter()
            .find(|h| h.name.eq_nocase(name.as_bytes()))
            .map(|h| &h.value)
    }

    pub fn response_header_len(&self) -> u64 {
        self.response_header_len
    }

    pub(crate) fn append_response_headers(&mut self, headers: &[Header]) {
        for header in headers {
            self.response_header_len += header.wire_len();
            self.response_headers.push(header.clone());
        }
    }

    pub fn response_body(&self) -> &BodyCapture {
        &self.response_body
    }

    pub fn response_body_len(&self) -> u64 {
        self.response_body_len
    }

    pub(crate) fn meter_response_body(&mut self, len: usize) {
        self.response_body_len += len as u64;
    }

    /// The capture buffer for one direction; the built-in raw stream
    /// processor writes through here.
    pub(crate) fn body_mut(&mut self, direction: Direction) -> &mut BodyCapture {
        match direction {
            Direction::Request => &mut self.request_body,
            Direction::Response => &mut self.response_body,
        }
    }

    // Pumps

    pub(crate) fn take_pump(&mut self, direction: Direction) -> StreamPump {
        match direction {
            Direction::Request => std::mem::replace(&mut self.request_pump, StreamPump::empty()),
            Direction::Response => std::mem::replace(&mut self.response_pump, StreamPump::empty()),
        }
    }

    pub(crate) fn restore_pump(&mut self, direction: Direction, pump: StreamPump) {
        match direction {
            Direction::Request => self.request_pump = pump,
            Direction::Response => self.response_pump = pump,
        }
    }

    // Vars & module data

    pub fn vars(&self) -> &VarStore {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarStore {
        &mut self.vars
    }

    pub fn module_data(&self) -> &ModuleSlots {
        &self.module_data
    }

    pub fn module_data_mut(&mut self) -> &mut ModuleSlots {
        &mut self.module_data
    }

    // Blocking

    /// Whether a block on this transaction is enforced through the server
    /// interface or merely recorded.
    pub fn blocking_mode(&self) -> bool {
        self.blocking_mode
    }

    pub fn set_blocking_mode(&mut self, enabled: bool) {
        self.blocking_mode = enabled;
    }

    pub fn block_info(&self) -> Option<&BlockInfo> {
        self.block_info.as_ref()
    }

    pub(crate) fn set_block_info(&mut self, info: BlockInfo) {
        self.block_info = Some(info);
    }
}
