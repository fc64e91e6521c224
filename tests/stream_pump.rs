/// Integration tests for the streaming body pipeline: byte conservation
/// through the processor chain, the capture limit of the built-in raw
/// processor, flush semantics and error aborts.

use std::sync::{Arc, Mutex};

use hornet::{
    CallbackError, Direction, Engine, EngineConfig, EngineError, NotifyError, RequestLine,
    ServerDescriptor, ServerInterface, StreamError, StreamIo, StreamProcessor,
    StreamProcessorDef, Transaction, ENGINE_ABINUM, ENGINE_VERNUM,
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

/// Records every segment it sees, then forwards it unchanged.
struct Recorder {
    data: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<Mutex<usize>>,
}

impl StreamProcessor for Recorder {
    fn execute(&mut self, _tx: &mut Transaction, io: &mut StreamIo) -> Result<(), CallbackError> {
        while let Some(segment) = io.take() {
            if segment.is_data() {
                self.data.lock().unwrap().extend_from_slice(segment.bytes());
            } else {
                *self.flushes.lock().unwrap() += 1;
            }
            io.put(segment);
        }
        Ok(())
    }
}

struct RecorderTap {
    data: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<Mutex<usize>>,
}

fn engine_with_recorder(config: EngineConfig) -> (Engine, RecorderTap) {
    let mut engine = Engine::new(config, Box::new(TestServer)).unwrap();
    let tap = RecorderTap {
        data: Arc::new(Mutex::new(Vec::new())),
        flushes: Arc::new(Mutex::new(0)),
    };
    let data = tap.data.clone();
    let flushes = tap.flushes.clone();
    engine
        .register_stream_processor(StreamProcessorDef::new(
            "recorder",
            vec!["raw".to_string()],
            Box::new(move |_tx, _direction| -> Box<dyn StreamProcessor> {
                Box::new(Recorder {
                    data: data.clone(),
                    flushes: flushes.clone(),
                })
            }),
        ))
        .unwrap();
    engine.configure_finished().unwrap();
    (engine, tap)
}

// ========== Capture limit (scenario S7) ==========

#[test]
fn test_raw_processor_buffers_at_most_the_limit() {
    let config = EngineConfig {
        request_body_log_limit: 8,
        ..EngineConfig::default()
    };
    let (engine, tap) = engine_with_recorder(config);

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    engine
        .tx_add_stream_processor(tx, Direction::Request, "recorder", 1)
        .unwrap();
    engine
        .notify_request_started(tx, Some(RequestLine::from_raw("POST /u HTTP/1.1")))
        .unwrap();
    engine.notify_request_body_data(tx, b"abcdefghij").unwrap();

    // the capture buffer stops at the limit
    assert_eq!(tx.request_body().as_slice(), b"abcdefgh");
    assert_eq!(tx.request_body().limit(), 8);
    // downstream processors still observe all ten bytes
    assert_eq!(tap.data.lock().unwrap().as_slice(), b"abcdefghij");
    // the running total meters everything delivered
    assert_eq!(tx.request_body_len(), 10);
}

// ========== Conservation ==========

#[test]
fn test_chain_observes_all_pushes_in_order() {
    let (engine, tap) = engine_with_recorder(EngineConfig::default());

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    engine
        .tx_add_stream_processor(tx, Direction::Request, "recorder", 1)
        .unwrap();
    engine
        .notify_request_started(tx, Some(RequestLine::from_raw("POST /u HTTP/1.1")))
        .unwrap();
    for chunk in [&b"alpha"[..], b"", b"beta", b"gamma"] {
        engine.notify_request_body_data(tx, chunk).unwrap();
    }
    engine.notify_request_finished(tx).unwrap();

    // concatenation preserved, nothing duplicated or lost
    assert_eq!(tap.data.lock().unwrap().as_slice(), b"alphabetagamma");
    // request-finished flushed the pump exactly once
    assert_eq!(*tap.flushes.lock().unwrap(), 1);
    assert_eq!(tx.request_body().as_slice(), b"alphabetagamma");
}

#[test]
fn test_request_and_response_pumps_are_independent() {
    let (engine, tap) = engine_with_recorder(EngineConfig::default());

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    engine
        .tx_add_stream_processor(tx, Direction::Response, "recorder", 1)
        .unwrap();
    engine
        .notify_request_started(tx, Some(RequestLine::from_raw("GET / HTTP/1.1")))
        .unwrap();
    // request body flows through the request pump only; the recorder sits
    // on the response pump
    engine.notify_request_body_data(tx, b"request-bytes").unwrap();
    assert!(tap.data.lock().unwrap().is_empty());

    engine.notify_response_body_data(tx, b"response-bytes").unwrap();
    assert_eq!(tap.data.lock().unwrap().as_slice(), b"response-bytes");
    assert_eq!(tx.request_body().as_slice(), b"request-bytes");
    assert_eq!(tx.response_body().as_slice(), b"response-bytes");
}

// ========== Registration and insertion errors ==========

#[test]
fn test_unknown_processor_cannot_be_inserted() {
    let (engine, _tap) = engine_with_recorder(EngineConfig::default());
    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    assert_eq!(
        engine.tx_add_stream_processor(tx, Direction::Request, "nope", 1),
        Err(EngineError::Stream(StreamError::UnknownProcessor {
            name: "nope".to_string()
        }))
    );
}

#[test]
fn test_insertion_index_is_bounds_checked() {
    let (engine, _tap) = engine_with_recorder(EngineConfig::default());
    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    // the pump currently holds only the raw processor
    assert_eq!(
        engine.tx_add_stream_processor(tx, Direction::Request, "recorder", 5),
        Err(EngineError::Stream(StreamError::IndexOutOfRange {
            index: 5,
            len: 1
        }))
    );
}

#[test]
fn test_duplicate_processor_registration_is_refused() {
    let mut engine = Engine::new(EngineConfig::default(), Box::new(TestServer)).unwrap();
    engine
        .register_stream_processor(StreamProcessorDef::new(
            "gzip",
            vec!["raw".to_string()],
            Box::new(|_, _| -> Box<dyn StreamProcessor> {
                Box::new(Recorder {
                    data: Arc::new(Mutex::new(Vec::new())),
                    flushes: Arc::new(Mutex::new(0)),
                })
            }),
        ))
        .unwrap();
    let result = engine.register_stream_processor(StreamProcessorDef::new(
        "GZIP",
        vec!["raw".to_string()],
        Box::new(|_, _| -> Box<dyn StreamProcessor> {
            Box::new(Recorder {
                data: Arc::new(Mutex::new(Vec::new())),
                flushes: Arc::new(Mutex::new(0)),
            })
        }),
    ));
    assert!(matches!(
        result,
        Err(EngineError::Stream(StreamError::DuplicateProcessor { .. }))
    ));
}

// ========== Processor failure aborts the push ==========

struct Failing;

impl StreamProcessor for Failing {
    fn execute(&mut self, _tx: &mut Transaction, _io: &mut StreamIo) -> Result<(), CallbackError> {
        Err(CallbackError::new("inflate failed"))
    }
}

#[test]
fn test_failing_processor_aborts_the_push() {
    let mut engine = Engine::new(EngineConfig::default(), Box::new(TestServer)).unwrap();
    engine
        .register_stream_processor(StreamProcessorDef::new(
            "failing",
            vec!["raw".to_string()],
            Box::new(|_, _| -> Box<dyn StreamProcessor> { Box::new(Failing) }),
        ))
        .unwrap();
    engine.configure_finished().unwrap();

    let mut conn = engine.conn_create("10.0.0.1", 4000, "10.0.0.2", 80);
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    engine
        .tx_add_stream_processor(tx, Direction::Request, "failing", 1)
        .unwrap();
    engine
        .notify_request_started(tx, Some(RequestLine::from_raw("POST /u HTTP/1.1")))
        .unwrap();
    let result = engine.notify_request_body_data(tx, b"zzz");
    assert_eq!(
        result,
        Err(NotifyError::Stream(StreamError::ProcessorFailed {
            name: "failing".to_string(),
            message: "inflate failed".to_string(),
        }))
    );
}
