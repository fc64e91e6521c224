/// Integration tests for hook registration and dispatch error handling:
/// shape validation, registration ordering, declined hooks and error
/// propagation.

use std::sync::{Arc, Mutex};

use hornet::{
    CallbackError, CallbackShape, Engine, EngineConfig, EngineError, HookError, HookFn,
    HookVerdict, NotifyError, RequestLine, ServerDescriptor, ServerInterface, State,
    ENGINE_ABINUM, ENGINE_VERNUM,
};

struct TestServer;

impl ServerInterface for TestServer {
    fn descriptor(&self) -> ServerDescriptor {
        ServerDescriptor {
            vernum: ENGINE_VERNUM,
            abinum: ENGINE_ABINUM,
            version: "test".to_string(),
            filename: file!().to_string(),
            name: "test-host".to_string(),
        }
    }
}

fn new_engine() -> Engine {
    Engine::new(EngineConfig::default(), Box::new(TestServer)).unwrap()
}

// ========== Shape validation ==========

#[test]
fn test_wrong_shape_is_rejected_and_not_stored() {
    let mut engine = new_engine();
    // a conn-shaped callback on a tx-shaped state
    let result = engine.register_hook(
        State::RequestFinished,
        "wrong-shape",
        HookFn::Conn(Box::new(|_, _, _| Ok(HookVerdict::Continue))),
    );
    assert_eq!(
        result,
        Err(EngineError::Hook(HookError::ShapeMismatch {
            hook: "wrong-shape".to_string(),
            state: "request-finished",
            expected: "tx",
            found: "conn",
        }))
    );
    assert_eq!(engine.hook_count(State::RequestFinished), 0);
}

#[test]
fn test_every_state_accepts_only_its_own_shape() {
    let mut engine = new_engine();
    for state in State::ALL {
        // a null-shaped callback fits exactly the null-shaped states
        let result = engine.register_hook(
            state,
            "probe",
            HookFn::Null(Box::new(|_, _| Ok(HookVerdict::Continue))),
        );
        if state.shape() == CallbackShape::Null {
            assert!(result.is_ok(), "null hook refused on {}", state.name());
        } else {
            assert!(result.is_err(), "null hook accepted on {}", state.name());
            assert_eq!(engine.hook_count(state), 0);
        }
    }
}

#[test]
fn test_matching_shape_is_stored_in_order() {
    let mut engine = new_engine();
    engine
        .on_tx(State::HandleRequest, "first", |_, _, _| {
            Ok(HookVerdict::Continue)
        })
        .unwrap();
    engine
        .on_tx(State::HandleRequest, "second", |_, _, _| {
            Ok(HookVerdict::Continue)
        })
        .unwrap();
    assert_eq!(engine.hook_count(State::HandleRequest), 2);
}

// ========== Dispatch ordering ==========

#[test]
fn test_hooks_fire_in_registration_order_every_time() {
    let mut engine = new_engine();
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    for name in ["h1", "h2", "h3", "h4"] {
        let order = order.clone();
        engine
            .on_tx(State::HandleRequest, name, move |_, _, _| {
                order.lock().unwrap().push(name);
                Ok(HookVerdict::Continue)
            })
            .unwrap();
    }
    engine.configure_finished().unwrap();

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    engine.notify_conn_opened(&mut conn).unwrap();
    for _ in 0..3 {
        let tx_id = engine.tx_create(&mut conn).unwrap();
        let tx = conn.tx_mut(tx_id).unwrap();
        engine
            .notify_request_started(tx, Some(RequestLine::from_raw("GET / HTTP/1.1")))
            .unwrap();
        engine.notify_request_finished(tx).unwrap();
    }
    assert_eq!(
        *order.lock().unwrap(),
        vec!["h1", "h2", "h3", "h4", "h1", "h2", "h3", "h4", "h1", "h2", "h3", "h4"]
    );
}

// ========== Declined and failing hooks ==========

#[test]
fn test_declined_hook_does_not_stop_the_chain() {
    let mut engine = new_engine();
    let ran: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let ran = ran.clone();
        engine
            .on_tx(State::HandleRequest, "declines", move |_, _, _| {
                ran.lock().unwrap().push("declines");
                Ok(HookVerdict::Declined)
            })
            .unwrap();
    }
    {
        let ran = ran.clone();
        engine
            .on_tx(State::HandleRequest, "continues", move |_, _, _| {
                ran.lock().unwrap().push("continues");
                Ok(HookVerdict::Continue)
            })
            .unwrap();
    }
    engine.configure_finished().unwrap();

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    engine
        .notify_request_started(tx, Some(RequestLine::from_raw("GET / HTTP/1.1")))
        .unwrap();
    engine.notify_request_finished(tx).unwrap();
    assert_eq!(*ran.lock().unwrap(), vec!["declines", "continues"]);
}

#[test]
fn test_failing_hook_stops_the_chain_and_propagates() {
    let mut engine = new_engine();
    let ran: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let ran = ran.clone();
        engine
            .on_tx(State::HandleRequest, "ok-hook", move |_, _, _| {
                ran.lock().unwrap().push("ok-hook");
                Ok(HookVerdict::Continue)
            })
            .unwrap();
    }
    engine
        .on_tx(State::HandleRequest, "broken-hook", |_, _, _| {
            Err(CallbackError::new("rule store unavailable"))
        })
        .unwrap();
    {
        let ran = ran.clone();
        engine
            .on_tx(State::HandleRequest, "never-runs", move |_, _, _| {
                ran.lock().unwrap().push("never-runs");
                Ok(HookVerdict::Continue)
            })
            .unwrap();
    }
    engine.configure_finished().unwrap();

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    engine
        .notify_request_started(tx, Some(RequestLine::from_raw("GET / HTTP/1.1")))
        .unwrap();
    let result = engine.notify_request_finished(tx);
    assert_eq!(
        result,
        Err(NotifyError::Hook(HookError::CallbackFailed {
            hook: "broken-hook".to_string(),
            state: "handle-request",
            message: "rule store unavailable".to_string(),
        }))
    );
    // the chain stopped at the failure
    assert_eq!(*ran.lock().unwrap(), vec!["ok-hook"]);
}

// ========== Error type surface ==========

#[test]
fn test_hook_error_display_names_the_hook() {
    let error = HookError::CallbackFailed {
        hook: "rules".to_string(),
        state: "handle-request",
        message: "boom".to_string(),
    };
    let message = format!("{error}");
    assert!(message.contains("rules"));
    assert!(message.contains("handle-request"));
    assert!(message.contains("boom"));
}

#[test]
fn test_hook_error_is_cloneable_and_comparable() {
    let error = HookError::ShapeMismatch {
        hook: "h".to_string(),
        state: "request-started",
        expected: "reqline",
        found: "tx",
    };
    assert_eq!(error.clone(), error);
}

// ========== Incompatible server ==========

struct FutureServer;

impl ServerInterface for FutureServer {
    fn descriptor(&self) -> ServerDescriptor {
        ServerDescriptor {
            vernum: ENGINE_VERNUM + 1,
            abinum: ENGINE_ABINUM,
            version: "future".to_string(),
            filename: file!().to_string(),
            name: "future-host".to_string(),
        }
    }
}

#[test]
fn test_newer_server_interface_is_refused() {
    let result = Engine::new(EngineConfig::default(), Box::new(FutureServer));
    assert!(matches!(
        result,
        Err(EngineError::IncompatibleServer { .. })
    ));
}
