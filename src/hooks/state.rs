/// A lifecycle point fired by the notifier.
///
/// Every state is tagged with the [`CallbackShape`] its hooks must have;
/// registering a callback of another shape is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    // engine states
    ConnStarted,
    ConnFinished,
    TxStarted,
    TxProcess,
    TxFinished,

    // handler states
    HandleContextConn,
    HandleConnect,
    HandleContextTx,
    HandleRequestHeader,
    HandleRequest,
    HandleResponseHeader,
    HandleResponse,
    HandleDisconnect,
    HandlePostprocess,
    HandleLogging,
    HandleLogevent,

    // server-origin states
    ConnOpened,
    ConnClosed,

    // parser-origin states
    RequestStarted,
    RequestHeaderData,
    RequestHeaderProcess,
    RequestHeaderFinished,
    RequestBodyData,
    RequestFinished,
    ResponseStarted,
    ResponseHeaderData,
    ResponseHeaderFinished,
    ResponseBodyData,
    ResponseFinished,

    // context lifecycle states
    ContextOpen,
    ContextClose,
    ContextDestroy,

    // engine lifecycle states
    EngineShutdownInitiated,
}

/// The callback signature a state expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackShape {
    Null,
    Conn,
    Tx,
    TxData,
    Header,
    ReqLine,
    RespLine,
    Ctx,
}

impl CallbackShape {
    pub fn name(self) -> &'static str {
        match self {
            CallbackShape::Null => "null",
            CallbackShape::Conn => "conn",
            CallbackShape::Tx => "tx",
            CallbackShape::TxData => "txdata",
            CallbackShape::Header => "header",
            CallbackShape::ReqLine => "reqline",
            CallbackShape::RespLine => "respline",
            CallbackShape::Ctx => "ctx",
        }
    }
}

impl State {
    pub const COUNT: usize = 33;

    pub const ALL: [State; State::COUNT] = [
        State::ConnStarted,
        State::ConnFinished,
        State::TxStarted,
        State::TxProcess,
        State::TxFinished,
        State::HandleContextConn,
        State::HandleConnect,
        State::HandleContextTx,
        State::HandleRequestHeader,
        State::HandleRequest,
        State::HandleResponseHeader,
        State::HandleResponse,
        State::HandleDisconnect,
        State::HandlePostprocess,
        State::HandleLogging,
        State::HandleLogevent,
        State::ConnOpened,
        State::ConnClosed,
        State::RequestStarted,
        State::RequestHeaderData,
        State::RequestHeaderProcess,
        State::RequestHeaderFinished,
        State::RequestBodyData,
        State::RequestFinished,
        State::ResponseStarted,
        State::ResponseHeaderData,
        State::ResponseHeaderFinished,
        State::ResponseBodyData,
        State::ResponseFinished,
        State::ContextOpen,
        State::ContextClose,
        State::ContextDestroy,
        State::EngineShutdownInitiated,
    ];

    /// The callback shape hooks for this state must have.
    pub fn shape(self) -> CallbackShape {
        match self {
            State::ConnStarted
            | State::ConnFinished
            | State::ConnOpened
            | State::ConnClosed
            | State::HandleContextConn
            | State::HandleConnect
            | State::HandleDisconnect => CallbackShape::Conn,

            State::TxStarted
            | State::TxProcess
            | State::TxFinished
            | State::HandleContextTx
            | State::HandleRequestHeader
            | State::HandleRequest
            | State::HandleResponseHeader
            | State::HandleResponse
            | State::HandlePostprocess
            | State::HandleLogging
            | State::HandleLogevent
            | State::RequestHeaderProcess
            | State::RequestHeaderFinished
            | State::RequestFinished
            | State::ResponseHeaderFinished
            | State::ResponseFinished => CallbackShape::Tx,

            State::RequestBodyData | State::ResponseBodyData => CallbackShape::TxData,

            State::RequestHeaderData | State::ResponseHeaderData => CallbackShape::Header,

            State::RequestStarted => CallbackShape::ReqLine,
            State::ResponseStarted => CallbackShape::RespLine,

            State::ContextOpen | State::ContextClose | State::ContextDestroy => {
                CallbackShape::Ctx
            }

            State::EngineShutdownInitiated => CallbackShape::Null,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            State::ConnStarted => "conn-started",
            State::ConnFinished => "conn-finished",
            State::TxStarted => "tx-started",
            State::TxProcess => "tx-process",
            State::TxFinished => "tx-finished",
            State::HandleContextConn => "handle-context-conn",
            State::HandleConnect => "handle-connect",
            State::HandleContextTx => "handle-context-tx",
            State::HandleRequestHeader => "handle-request-header",
            State::HandleRequest => "handle-request",
            State::HandleResponseHeader => "handle-response-header",
            State::HandleResponse => "handle-response",
            State::HandleDisconnect => "handle-disconnect",
            State::HandlePostprocess => "handle-postprocess",
            State::HandleLogging => "handle-logging",
            State::HandleLogevent => "handle-logevent",
            State::ConnOpened => "conn-opened",
            State::ConnClosed => "conn-closed",
            State::RequestStarted => "request-started",
            State::RequestHeaderData => "request-header-data",
            State::RequestHeaderProcess => "request-header-process",
            State::RequestHeaderFinished => "request-header-finished",
            State::RequestBodyData => "request-body-data",
            State::RequestFinished => "request-finished",
            State::ResponseStarted => "response-started",
            State::ResponseHeaderData => "response-header-data",
            State::ResponseHeaderFinished => "response-header-finished",
            State::ResponseBodyData => "response-body-data",
            State::ResponseFinished => "response-finished",
            State::ContextOpen => "context-open",
            State::ContextClose => "context-close",
            State::ContextDestroy => "context-destroy",
            State::EngineShutdownInitiated => "engine-shutdown-initiated",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_state_once() {
        for (at, state) in State::ALL.iter().enumerate() {
            assert_eq!(state.index(), at);
        }
    }

    #[test]
    fn tx_states_are_tx_shaped() {
        assert_eq!(State::RequestFinished.shape(), CallbackShape::Tx);
        assert_eq!(State::RequestBodyData.shape(), CallbackShape::TxData);
        assert_eq!(State::RequestStarted.shape(), CallbackShape::ReqLine);
        assert_eq!(State::ConnOpened.shape(), CallbackShape::Conn);
        assert_eq!(State::EngineShutdownInitiated.shape(), CallbackShape::Null);
    }
}
