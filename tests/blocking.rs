/// Integration tests for the blocking subsystem: advisory vs active
/// blocks, pre/post hook ordering, handler decline, idempotence and
/// soft-failure of unimplemented server operations.

use std::sync::{Arc, Mutex};

use hornet::{
    BlockError, BlockInfo, BlockMethod, BlockOutcome, CallbackError, Engine, EngineConfig,
    ServerDescriptor, ServerError, ServerInterface, Transaction, ENGINE_ABINUM, ENGINE_VERNUM,
};

/// A host double that records every call the engine makes through the
/// server interface.
struct ScriptedServer {
    calls: Arc<Mutex<Vec<String>>>,
    implement_error_response: bool,
}

impl ServerInterface for ScriptedServer {
    fn descriptor(&self) -> ServerDescriptor {
        ServerDescriptor {
            vernum: ENGINE_VERNUM,
            abinum: ENGINE_ABINUM,
            version: "test".to_string(),
            filename: file!().to_string(),
            name: "scripted-host".to_string(),
        }
    }

    fn error_response(&self, _tx: &Transaction, status: u16) -> Result<(), ServerError> {
        if !self.implement_error_response {
            return Err(ServerError::NotImplemented);
        }
        self.calls.lock().unwrap().push(format!("error_response {status}"));
        Ok(())
    }

    fn close_connection(&self, _tx: &Transaction) -> Result<(), ServerError> {
        self.calls.lock().unwrap().push("close_connection".to_string());
        Ok(())
    }
}

struct Harness {
    engine: Engine,
    calls: Arc<Mutex<Vec<String>>>,
    hook_log: Arc<Mutex<Vec<String>>>,
}

fn harness(blocking_mode: bool, handler: Option<BlockInfo>, install_handler: bool) -> Harness {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let server = ScriptedServer {
        calls: calls.clone(),
        implement_error_response: true,
    };
    let config = EngineConfig {
        blocking_mode,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config, Box::new(server)).unwrap();

    let hook_log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = hook_log.clone();
        engine
            .register_block_pre_hook("pre", move |_, _| {
                log.lock().unwrap().push("pre".to_string());
                Ok(())
            })
            .unwrap();
    }
    {
        let log = hook_log.clone();
        engine
            .register_block_post_hook("post", move |_, _, info| {
                log.lock().unwrap().push(format!("post {}", info.status));
                Ok(())
            })
            .unwrap();
    }
    if install_handler {
        engine
            .set_block_handler("policy", move |_, _| Ok(handler))
            .unwrap();
    }
    engine.configure_finished().unwrap();
    Harness {
        engine,
        calls,
        hook_log,
    }
}

// ========== Advisory blocks (scenario S4) ==========

#[test]
fn test_advisory_block_records_but_does_not_enforce() {
    let h = harness(false, Some(BlockInfo::status(403)), true);
    let mut conn = h.engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = h.engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();

    let outcome = h.engine.tx_block(tx).unwrap();
    assert_eq!(outcome, BlockOutcome::Advisory);
    assert!(tx.is_blocked());
    assert_eq!(
        tx.block_info(),
        Some(&BlockInfo {
            method: BlockMethod::Status,
            status: 403
        })
    );
    // the server was never asked to act
    assert!(h.calls.lock().unwrap().is_empty());
    // but the post-hooks ran with the final block info
    assert_eq!(*h.hook_log.lock().unwrap(), vec!["pre", "post 403"]);
}

// ========== Active blocks ==========

#[test]
fn test_active_status_block_sends_error_response() {
    let h = harness(true, Some(BlockInfo::status(451)), true);
    let mut conn = h.engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = h.engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();

    let outcome = h.engine.tx_block(tx).unwrap();
    assert_eq!(outcome, BlockOutcome::Blocked);
    assert_eq!(*h.calls.lock().unwrap(), vec!["error_response 451"]);
    assert_eq!(*h.hook_log.lock().unwrap(), vec!["pre", "post 451"]);
}

#[test]
fn test_active_close_block_closes_the_connection() {
    let h = harness(true, Some(BlockInfo::close()), true);
    let mut conn = h.engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = h.engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();

    let outcome = h.engine.tx_block(tx).unwrap();
    assert_eq!(outcome, BlockOutcome::Blocked);
    assert!(tx.is_blocked());
    assert_eq!(tx.block_info().unwrap().method, BlockMethod::Close);
    assert_eq!(*h.calls.lock().unwrap(), vec!["close_connection"]);

    // scenario S5: a second tx_block is idempotent
    let again = h.engine.tx_block(tx).unwrap();
    assert_eq!(again, BlockOutcome::Blocked);
    assert_eq!(*h.calls.lock().unwrap(), vec!["close_connection"]);
    assert_eq!(*h.hook_log.lock().unwrap(), vec!["pre", "post 0"]);
}

// ========== Idempotence ==========

#[test]
fn test_repeated_blocks_fire_hooks_exactly_once() {
    let h = harness(false, Some(BlockInfo::status(403)), true);
    let mut conn = h.engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = h.engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();

    for _ in 0..5 {
        let outcome = h.engine.tx_block(tx).unwrap();
        assert_eq!(outcome, BlockOutcome::Advisory);
        assert_eq!(tx.block_info().map(|info| info.status), Some(403));
    }
    assert_eq!(*h.hook_log.lock().unwrap(), vec!["pre", "post 403"]);
}

// ========== Handler behavior ==========

#[test]
fn test_default_handler_blocks_with_403() {
    let h = harness(true, None, false);
    let mut conn = h.engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = h.engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();

    h.engine.tx_block(tx).unwrap();
    assert_eq!(tx.block_info().map(|info| info.status), Some(403));
    assert_eq!(*h.calls.lock().unwrap(), vec!["error_response 403"]);
}

#[test]
fn test_handler_decline_means_no_block() {
    let h = harness(true, None, true);
    let mut conn = h.engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = h.engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();

    let outcome = h.engine.tx_block(tx).unwrap();
    assert_eq!(outcome, BlockOutcome::HandlerDeclined);
    // the block request itself is still recorded
    assert!(tx.is_blocked());
    assert!(tx.block_info().is_none());
    assert!(h.calls.lock().unwrap().is_empty());
    // no block info, so the post-hooks did not run
    assert_eq!(*h.hook_log.lock().unwrap(), vec!["pre"]);
}

#[test]
fn test_only_one_handler_may_be_installed() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut engine = Engine::new(
        EngineConfig::default(),
        Box::new(ScriptedServer {
            calls,
            implement_error_response: true,
        }),
    )
    .unwrap();
    engine
        .set_block_handler("first", |_, _| Ok(Some(BlockInfo::status(403))))
        .unwrap();
    let result = engine.set_block_handler("second", |_, _| Ok(Some(BlockInfo::status(500))));
    assert!(matches!(
        result,
        Err(hornet::EngineError::Block(
            BlockError::HandlerAlreadyInstalled { .. }
        ))
    ));
}

// ========== Pre-hook aborts ==========

#[test]
fn test_failing_pre_hook_aborts_the_block() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut engine = Engine::new(
        EngineConfig {
            blocking_mode: true,
            ..EngineConfig::default()
        },
        Box::new(ScriptedServer {
            calls: calls.clone(),
            implement_error_response: true,
        }),
    )
    .unwrap();
    engine
        .register_block_pre_hook("veto", |_, _| Err(CallbackError::new("not now")))
        .unwrap();
    engine.configure_finished().unwrap();

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    let result = engine.tx_block(tx);
    assert_eq!(
        result,
        Err(BlockError::PreHookFailed {
            hook: "veto".to_string(),
            message: "not now".to_string(),
        })
    );
    // the block flag is set before pre-hooks run, so the request is
    // recorded even though the block never completed
    assert!(tx.is_blocked());
    assert!(calls.lock().unwrap().is_empty());
}

// ========== Server soft-failures ==========

#[test]
fn test_not_implemented_server_operation_soft_fails() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut engine = Engine::new(
        EngineConfig {
            blocking_mode: true,
            ..EngineConfig::default()
        },
        Box::new(ScriptedServer {
            calls: calls.clone(),
            implement_error_response: false,
        }),
    )
    .unwrap();
    engine.configure_finished().unwrap();

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    // the host cannot send error responses, but the block still records
    let outcome = engine.tx_block(tx).unwrap();
    assert_eq!(outcome, BlockOutcome::Blocked);
    assert!(tx.is_blocked());
    assert_eq!(tx.block_info().map(|info| info.status), Some(403));
    assert!(calls.lock().unwrap().is_empty());
}

// ========== Per-transaction blocking mode ==========

#[test]
fn test_blocking_mode_can_be_enabled_per_transaction() {
    let h = harness(false, Some(BlockInfo::status(403)), true);
    let mut conn = h.engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = h.engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    assert!(!tx.blocking_mode());

    tx.set_blocking_mode(true);
    let outcome = h.engine.tx_block(tx).unwrap();
    assert_eq!(outcome, BlockOutcome::Blocked);
    assert_eq!(*h.calls.lock().unwrap(), vec!["error_response 403"]);
}
