//! The lifecycle notifier: one entry point per externally-signalled state.
//!
//! Every entry enforces the same discipline: check the one-shot flag, set
//! it, record the phase timestamp, bind a context where the lifecycle says
//! so, fire the state's hooks, fire the follow-on handler hooks, and fire
//! the next synchronous state. Missing prerequisites are auto-triggered
//! recursively and recorded at debug level; double notification of a
//! one-shot state is an error and fires nothing. Streaming states
//! (`*_header_data`, `*_body_data`, connection data) are repeatable and
//! stamp their timestamp on the first call only.

use log::{debug, error};

use crate::conn::{ConnFlags, Connection, Header, RequestLine, ResponseLine, Transaction, TxFlags};
use crate::context::SelectorTarget;
use crate::engine::Engine;
use crate::hooks::State;
use crate::stream::StreamError;
use crate::types::Direction;

mod error;

pub use error::NotifyError;

fn already(state: State) -> NotifyError {
    error!("state `{}` was already notified", state.name());
    NotifyError::AlreadyNotified {
        state: state.name(),
    }
}

fn auto_trigger(state: State, cause: State) {
    debug!(
        "auto-triggering prerequisite `{}` of `{}`",
        state.name(),
        cause.name()
    );
}

impl Engine {
    // Connection states

    /// The host accepted a connection. Fires `conn-started`, then
    /// `conn-opened`, binds the connection context, then fires
    /// `handle-context-conn` and `handle-connect`.
    pub fn notify_conn_opened(&self, conn: &mut Connection) -> Result<(), NotifyError> {
        if conn.is_opened() {
            return Err(already(State::ConnOpened));
        }
        if !conn.flags.contains(ConnFlags::STARTED) {
            conn.flags.insert(ConnFlags::STARTED);
            self.fire_conn(conn, State::ConnStarted)?;
        }
        conn.mark_opened();
        self.fire_conn(conn, State::ConnOpened)?;

        let ctx = self.select_context(&SelectorTarget::Conn(&*conn))?;
        conn.bind_ctx(ctx);
        self.fire_conn(conn, State::HandleContextConn)?;
        self.fire_conn(conn, State::HandleConnect)?;
        Ok(())
    }

    /// The host saw inbound bytes on the connection. Repeatable; sets the
    /// monotonic `seen-data-in` flag.
    pub fn notify_conn_data_in(&self, conn: &mut Connection) -> Result<(), NotifyError> {
        if !conn.is_opened() {
            debug!("auto-triggering `conn-opened` before inbound connection data");
            self.notify_conn_opened(conn)?;
        }
        conn.flags.insert(ConnFlags::SEEN_DATA_IN);
        Ok(())
    }

    /// The host saw outbound bytes on the connection. Repeatable; sets
    /// the monotonic `seen-data-out` flag.
    pub fn notify_conn_data_out(&self, conn: &mut Connection) -> Result<(), NotifyError> {
        if !conn.is_opened() {
            debug!("auto-triggering `conn-opened` before outbound connection data");
            self.notify_conn_opened(conn)?;
        }
        conn.flags.insert(ConnFlags::SEEN_DATA_OUT);
        Ok(())
    }

    /// The connection is gone. Auto-completes every pending transaction
    /// through `logging`, then fires `conn-closed`, `handle-disconnect`
    /// and `conn-finished`.
    pub fn notify_conn_closed(&self, conn: &mut Connection) -> Result<(), NotifyError> {
        if conn.is_closed() {
            return Err(already(State::ConnClosed));
        }
        if !conn.is_opened() {
            auto_trigger(State::ConnOpened, State::ConnClosed);
            self.notify_conn_opened(conn)?;
        }
        for at in 0..conn.txs.len() {
            let tx = &mut conn.txs[at];
            self.complete_tx(tx)?;
        }
        conn.mark_closed();
        self.fire_conn(conn, State::ConnClosed)?;
        self.fire_conn(conn, State::HandleDisconnect)?;
        conn.flags.insert(ConnFlags::FINISHED);
        self.fire_conn(conn, State::ConnFinished)?;
        Ok(())
    }

    /// Drive an unfinished transaction through its remaining states so a
    /// closing connection leaves nothing half-done.
    fn complete_tx(&self, tx: &mut Transaction) -> Result<(), NotifyError> {
        if tx.is_finished() {
            return Ok(());
        }
        if !tx.is_started() && !tx.has_request_data() && !tx.has_response_data() {
            debug!(
                "transaction {:?} never carried data; skipping auto-completion",
                tx.id()
            );
            return Ok(());
        }
        if tx.has_request_data() && !tx.saw_request_finished() {
            auto_trigger(State::RequestFinished, State::ConnClosed);
            self.notify_request_finished(tx)?;
        }
        if !tx.flags.contains(TxFlags::RES_STARTED) {
            auto_trigger(State::ResponseStarted, State::ConnClosed);
            self.response_started_inner(tx, None, true)?;
        }
        if !tx.saw_response_finished() {
            auto_trigger(State::ResponseFinished, State::ConnClosed);
            self.notify_response_finished(tx)?;
        }
        if !tx.flags.contains(TxFlags::POSTPROCESS) {
            auto_trigger(State::HandlePostprocess, State::ConnClosed);
            self.notify_postprocess(tx)?;
        }
        if !tx.flags.contains(TxFlags::LOGGING) {
            auto_trigger(State::HandleLogging, State::ConnClosed);
            self.notify_logging(tx)?;
        }
        Ok(())
    }

    // Request states

    /// The parser saw the start of a request. `line` may be `None` when a
    /// later state auto-triggers this one before any line was parsed; an
    /// empty protocol token marks the transaction HTTP/0.9.
    pub fn notify_request_started(
        &self,
        tx: &mut Transaction,
        line: Option<RequestLine>,
    ) -> Result<(), NotifyError> {
        if tx.flags.contains(TxFlags::REQ_STARTED) {
            return Err(already(State::RequestStarted));
        }
        if !tx.flags.contains(TxFlags::TX_STARTED) {
            tx.flags.insert(TxFlags::TX_STARTED);
            tx.record_time(State::TxStarted);
            self.fire_tx(tx, State::TxStarted)?;
        }
        tx.flags.insert(TxFlags::REQ_STARTED);
        tx.flags.insert(TxFlags::HAS_REQ_DATA);
        tx.record_time(State::RequestStarted);
        if let Some(line) = line {
            if line.is_http09() {
                debug!("transaction {:?} is HTTP/0.9", tx.id());
                tx.flags.insert(TxFlags::HTTP09);
            }
            tx.set_request_line(line);
            tx.flags.insert(TxFlags::REQ_LINE);
        }
        let line = tx.request_line().cloned();
        self.fire_reqline(tx, State::RequestStarted, line.as_ref())?;
        Ok(())
    }

    /// The parser delivered a chunk of request headers. Repeatable;
    /// appends to the transaction's header list and updates the running
    /// header byte total.
    pub fn notify_request_header_data(
        &self,
        tx: &mut Transaction,
        headers: &[Header],
    ) -> Result<(), NotifyError> {
        if !tx.flags.contains(TxFlags::REQ_STARTED) {
            auto_trigger(State::RequestStarted, State::RequestHeaderData);
            self.notify_request_started(tx, None)?;
        }
        if !tx.flags.contains(TxFlags::REQ_HEADER_DATA) {
            tx.flags.insert(TxFlags::REQ_HEADER_DATA);
            tx.record_time(State::RequestHeaderData);
        }
        tx.flags.insert(TxFlags::HAS_REQ_DATA);
        tx.append_request_headers(headers);
        self.fire_header(tx, State::RequestHeaderData, headers)?;
        Ok(())
    }

    /// The request header is complete. Fires `request-header-process`,
    /// binds the transaction context, then fires `handle-context-tx`,
    /// `request-header-finished` and `handle-request-header`.
    pub fn notify_request_header_finished(&self, tx: &mut Transaction) -> Result<(), NotifyError> {
        if tx.flags.contains(TxFlags::REQ_HEADER) {
            return Err(already(State::RequestHeaderFinished));
        }
        if !tx.flags.contains(TxFlags::REQ_STARTED) {
            auto_trigger(State::RequestStarted, State::RequestHeaderFinished);
            self.notify_request_started(tx, None)?;
        }
        tx.record_time(State::RequestHeaderProcess);
        self.fire_tx(tx, State::RequestHeaderProcess)?;

        if tx.hostname().is_empty() {
            if let Some(host) = tx.request_header("host").cloned() {
                tx.set_hostname(host);
            }
        }
        let ctx = self.select_context(&SelectorTarget::Tx(&*tx))?;
        tx.bind_ctx(ctx);
        self.fire_tx(tx, State::HandleContextTx)?;

        tx.flags.insert(TxFlags::REQ_HEADER);
        tx.record_time(State::RequestHeaderFinished);
        self.fire_tx(tx, State::RequestHeaderFinished)?;
        self.fire_tx(tx, State::HandleRequestHeader)?;
        Ok(())
    }

    /// The parser delivered a chunk of request body. Repeatable; meters
    /// the body length, fires the data hooks and pushes the bytes through
    /// the request pump.
    pub fn notify_request_body_data(
        &self,
        tx: &mut Transaction,
        data: &[u8],
    ) -> Result<(), NotifyError> {
        if !tx.flags.contains(TxFlags::REQ_HEADER) {
            auto_trigger(State::RequestHeaderFinished, State::RequestBodyData);
            self.notify_request_header_finished(tx)?;
        }
        if !tx.flags.contains(TxFlags::REQ_BODY) {
            tx.flags.insert(TxFlags::REQ_BODY);
            tx.record_time(State::RequestBodyData);
        }
        tx.flags.insert(TxFlags::HAS_REQ_DATA);
        tx.meter_request_body(data.len());
        self.fire_tx_data(tx, State::RequestBodyData, data)?;
        self.pump_push(tx, Direction::Request, data)?;
        Ok(())
    }

    /// The request is complete. Flushes the request pump, then fires
    /// `request-finished`, `handle-request` and `tx-process`. A
    /// transaction that never carried request data ignores this with a
    /// debug record. No zero-length body-data event is synthesized.
    pub fn notify_request_finished(&self, tx: &mut Transaction) -> Result<(), NotifyError> {
        if tx.flags.contains(TxFlags::REQ_FINISHED) {
            return Err(already(State::RequestFinished));
        }
        if !tx.has_request_data() {
            debug!(
                "transaction {:?} carried no request data; ignoring request-finished",
                tx.id()
            );
            return Ok(());
        }
        if !tx.flags.contains(TxFlags::REQ_HEADER) {
            auto_trigger(State::RequestHeaderFinished, State::RequestFinished);
            self.notify_request_header_finished(tx)?;
        }
        tx.flags.insert(TxFlags::REQ_FINISHED);
        tx.record_time(State::RequestFinished);
        self.pump_flush(tx, Direction::Request)?;
        self.fire_tx(tx, State::RequestFinished)?;
        self.fire_tx(tx, State::HandleRequest)?;
        tx.record_time(State::TxProcess);
        self.fire_tx(tx, State::TxProcess)?;
        Ok(())
    }

    // Response states

    /// The parser saw the start of a response. `line` may only be `None`
    /// for an HTTP/0.9 transaction (internal auto-completion is exempt).
    pub fn notify_response_started(
        &self,
        tx: &mut Transaction,
        line: Option<ResponseLine>,
    ) -> Result<(), NotifyError> {
        self.response_started_inner(tx, line, false)
    }

    fn response_started_inner(
        &self,
        tx: &mut Transaction,
        line: Option<ResponseLine>,
        auto: bool,
    ) -> Result<(), NotifyError> {
        if tx.flags.contains(TxFlags::RES_STARTED) {
            return Err(already(State::ResponseStarted));
        }
        if line.is_none() && !tx.is_http09() && !auto {
            error!(
                "response started without a line on non-HTTP/0.9 transaction {:?}",
                tx.id()
            );
            return Err(NotifyError::ResponseLineRequired);
        }
        if tx.has_request_data() && !tx.saw_request_finished() {
            auto_trigger(State::RequestFinished, State::ResponseStarted);
            self.notify_request_finished(tx)?;
        }
        tx.flags.insert(TxFlags::RES_STARTED);
        tx.record_time(State::ResponseStarted);
        if let Some(line) = line {
            tx.set_response_line(line);
            tx.flags.insert(TxFlags::RES_LINE);
            tx.flags.insert(TxFlags::HAS_RES_DATA);
        }
        let line = tx.response_line().cloned();
        self.fire_respline(tx, State::ResponseStarted, line.as_ref())?;
        Ok(())
    }

    /// The parser delivered a chunk of response headers. Repeatable.
    pub fn notify_response_header_data(
        &self,
        tx: &mut Transaction,
        headers: &[Header],
    ) -> Result<(), NotifyError> {
        if !tx.flags.contains(TxFlags::RES_STARTED) {
            auto_trigger(State::ResponseStarted, State::ResponseHeaderData);
            self.response_started_inner(tx, None, true)?;
        }
        if !tx.flags.contains(TxFlags::RES_HEADER_DATA) {
            tx.flags.insert(TxFlags::RES_HEADER_DATA);
            tx.record_time(State::ResponseHeaderData);
        }
        tx.flags.insert(TxFlags::HAS_RES_DATA);
        tx.append_response_headers(headers);
        self.fire_header(tx, State::ResponseHeaderData, headers)?;
        Ok(())
    }

    /// The response header is complete. Fires `response-header-finished`
    /// and `handle-response-header`.
    pub fn notify_response_header_finished(&self, tx: &mut Transaction) -> Result<(), NotifyError> {
        if tx.flags.contains(TxFlags::RES_HEADER) {
            return Err(already(State::ResponseHeaderFinished));
        }
        if !tx.flags.contains(TxFlags::RES_STARTED) {
            auto_trigger(State::ResponseStarted, State::ResponseHeaderFinished);
            self.response_started_inner(tx, None, true)?;
        }
        tx.flags.insert(TxFlags::RES_HEADER);
        tx.record_time(State::ResponseHeaderFinished);
        self.fire_tx(tx, State::ResponseHeaderFinished)?;
        self.fire_tx(tx, State::HandleResponseHeader)?;
        Ok(())
    }

    /// The parser delivered a chunk of response body. Repeatable; meters,
    /// fires the data hooks and pushes through the response pump.
    pub fn notify_response_body_data(
        &self,
        tx: &mut Transaction,
        data: &[u8],
    ) -> Result<(), NotifyError> {
        if !tx.flags.contains(TxFlags::RES_HEADER) {
            auto_trigger(State::ResponseHeaderFinished, State::ResponseBodyData);
            self.notify_response_header_finished(tx)?;
        }
        if !tx.flags.contains(TxFlags::RES_BODY) {
            tx.flags.insert(TxFlags::RES_BODY);
            tx.record_time(State::ResponseBodyData);
        }
        tx.flags.insert(TxFlags::HAS_RES_DATA);
        tx.meter_response_body(data.len());
        self.fire_tx_data(tx, State::ResponseBodyData, data)?;
        self.pump_push(tx, Direction::Response, data)?;
        Ok(())
    }

    /// The response is complete. Flushes the response pump, then fires
    /// `response-finished` and `handle-response`.
    pub fn notify_response_finished(&self, tx: &mut Transaction) -> Result<(), NotifyError> {
        if tx.flags.contains(TxFlags::RES_FINISHED) {
            return Err(already(State::ResponseFinished));
        }
        if !tx.flags.contains(TxFlags::RES_HEADER) {
            auto_trigger(State::ResponseHeaderFinished, State::ResponseFinished);
            self.notify_response_header_finished(tx)?;
        }
        tx.flags.insert(TxFlags::RES_FINISHED);
        tx.record_time(State::ResponseFinished);
        self.pump_flush(tx, Direction::Response)?;
        self.fire_tx(tx, State::ResponseFinished)?;
        self.fire_tx(tx, State::HandleResponse)?;
        Ok(())
    }

    // Post-transaction states

    /// Post-transaction analysis point; fires `handle-postprocess`.
    pub fn notify_postprocess(&self, tx: &mut Transaction) -> Result<(), NotifyError> {
        if tx.flags.contains(TxFlags::POSTPROCESS) {
            return Err(already(State::HandlePostprocess));
        }
        tx.flags.insert(TxFlags::POSTPROCESS);
        tx.record_time(State::HandlePostprocess);
        self.fire_tx(tx, State::HandlePostprocess)?;
        Ok(())
    }

    /// Logging point; fires `handle-logging` and then `tx-finished`.
    pub fn notify_logging(&self, tx: &mut Transaction) -> Result<(), NotifyError> {
        if tx.flags.contains(TxFlags::LOGGING) {
            return Err(already(State::HandleLogging));
        }
        tx.flags.insert(TxFlags::LOGGING);
        tx.record_time(State::HandleLogging);
        self.fire_tx(tx, State::HandleLogging)?;
        if !tx.flags.contains(TxFlags::TX_FINISHED) {
            tx.flags.insert(TxFlags::TX_FINISHED);
            tx.record_time(State::TxFinished);
            self.fire_tx(tx, State::TxFinished)?;
        }
        Ok(())
    }

    /// A module recorded an inspection event; fires `handle-logevent`.
    /// Repeatable.
    pub fn notify_logevent(&self, tx: &mut Transaction) -> Result<(), NotifyError> {
        self.fire_tx(tx, State::HandleLogevent)?;
        Ok(())
    }

    // Pump plumbing

    fn pump_push(
        &self,
        tx: &mut Transaction,
        direction: Direction,
        data: &[u8],
    ) -> Result<(), StreamError> {
        let mut pump = tx.take_pump(direction);
        let result = pump.push(tx, data);
        tx.restore_pump(direction, pump);
        result
    }

    fn pump_flush(&self, tx: &mut Transaction, direction: Direction) -> Result<(), StreamError> {
        let mut pump = tx.take_pump(direction);
        let result = pump.flush(tx);
        tx.restore_pump(direction, pump);
        result
    }
}
