//! End-to-end state machine tests: single requests, bodies, chunked
//! framing, pipelining, and delivery-order invariants.

use kiln_http::{
    Conn, ConnState, HttpError, HttpLimits, Method, Packet, Pipeline, PipelineFactory, RecvQueue,
    Rx, Tx, Verdict,
};
use proptest::{prop_assert_eq, proptest};
use std::sync::{Arc, Mutex};

/// Facts captured about one request while its pipeline ran.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    method: Option<Method>,
    path_info: String,
    length: i64,
    remaining_content: i64,
    received_content: i64,
    eof: bool,
    body: Vec<u8>,
    saw_end: bool,
}

#[derive(Default)]
struct Log {
    current: Snapshot,
    finished: Vec<Snapshot>,
}

struct Recorder {
    log: Arc<Mutex<Log>>,
    verdict: Verdict,
}

impl Pipeline for Recorder {
    fn start(&mut self, rx: &mut Rx, _tx: &mut Tx) -> Result<(), HttpError> {
        let mut log = self.log.lock().unwrap();
        log.current = Snapshot {
            method: rx.method,
            path_info: rx.path_info.clone(),
            length: rx.length,
            ..Snapshot::default()
        };
        Ok(())
    }

    fn process(&mut self, rx: &mut Rx, _tx: &mut Tx, recv: &mut RecvQueue) -> Verdict {
        let mut log = self.log.lock().unwrap();
        while let Some(packet) = recv.pop() {
            match packet {
                Packet::Data(bytes) => log.current.body.extend_from_slice(&bytes),
                Packet::End => log.current.saw_end = true,
            }
        }
        if log.current.saw_end {
            log.current.remaining_content = rx.remaining_content;
            log.current.received_content = rx.received_content;
            log.current.eof = rx.eof;
            let snapshot = std::mem::take(&mut log.current);
            log.finished.push(snapshot);
        }
        self.verdict
    }
}

struct RecorderFactory {
    log: Arc<Mutex<Log>>,
    verdict: Verdict,
}

impl RecorderFactory {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Log::default())),
            verdict: Verdict::Complete,
        }
    }

    fn finished(&self) -> Vec<Snapshot> {
        self.log.lock().unwrap().finished.clone()
    }
}

impl PipelineFactory for RecorderFactory {
    fn create(&mut self, _rx: &mut Rx, _tx: &mut Tx) -> Result<Box<dyn Pipeline>, HttpError> {
        Ok(Box::new(Recorder {
            log: Arc::clone(&self.log),
            verdict: self.verdict,
        }))
    }
}

fn run(input: &[u8]) -> (Conn, RecorderFactory) {
    let mut conn = Conn::server(HttpLimits::default());
    let mut factory = RecorderFactory::new();
    conn.feed(input);
    conn.advance(&mut factory);
    (conn, factory)
}

const MINIMAL_GET: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
const POST_WITH_LENGTH: &[u8] = b"POST /a HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";
const CHUNKED_POST: &[u8] = b"POST / HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n\
    5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";

// ============================================================================
// Single-request scenarios
// ============================================================================

#[test]
fn minimal_get_completes() {
    let (conn, factory) = run(MINIMAL_GET);
    let finished = factory.finished();
    assert_eq!(finished.len(), 1);
    let req = &finished[0];
    assert_eq!(req.method, Some(Method::Get));
    assert_eq!(req.path_info, "/");
    assert_eq!(req.length, -1);
    assert_eq!(req.remaining_content, 0);
    assert!(req.eof);
    assert!(req.saw_end);
    assert!(req.body.is_empty());
    assert_eq!(conn.requests_completed(), 1);
    assert_eq!(conn.state(), ConnState::Begin);
    assert_eq!(conn.input_len(), 0);
}

#[test]
fn post_with_content_length_delivers_body() {
    let (conn, factory) = run(POST_WITH_LENGTH);
    let finished = factory.finished();
    assert_eq!(finished.len(), 1);
    let req = &finished[0];
    assert_eq!(req.body, b"hello");
    assert_eq!(req.received_content, 5);
    assert_eq!(req.remaining_content, 0);
    assert!(req.saw_end);
    assert_eq!(conn.requests_completed(), 1);
}

#[test]
fn chunked_post_reassembles_payloads() {
    let (conn, factory) = run(CHUNKED_POST);
    let finished = factory.finished();
    assert_eq!(finished.len(), 1);
    let req = &finished[0];
    assert_eq!(req.body, b"hello world");
    assert!(req.eof);
    assert!(req.saw_end);
    assert_eq!(conn.requests_completed(), 1);
    assert_eq!(conn.input_len(), 0);
}

// ============================================================================
// Pipelining
// ============================================================================

#[test]
fn pipelined_requests_complete_in_order_from_one_event() {
    let mut input = Vec::new();
    input.extend_from_slice(MINIMAL_GET);
    input.extend_from_slice(POST_WITH_LENGTH);
    let (conn, factory) = run(&input);

    let finished = factory.finished();
    assert_eq!(finished.len(), 2);
    assert_eq!(finished[0].method, Some(Method::Get));
    assert_eq!(finished[1].method, Some(Method::Post));
    assert_eq!(finished[1].body, b"hello");
    assert_eq!(conn.requests_completed(), 2);
    assert_eq!(conn.input_len(), 0);
}

#[test]
fn body_packet_split_at_request_boundary() {
    // The second request's head rides in the same read as the first
    // request's body; the split leaves it intact as the next input.
    let mut input = Vec::new();
    input.extend_from_slice(POST_WITH_LENGTH);
    input.extend_from_slice(MINIMAL_GET);
    let (conn, factory) = run(&input);

    let finished = factory.finished();
    assert_eq!(finished.len(), 2);
    assert_eq!(finished[0].body, b"hello");
    assert!(finished[1].body.is_empty());
    assert_eq!(conn.requests_completed(), 2);
}

#[test]
fn pipelined_stream_of_n_requests() {
    let n = 7;
    let mut input = Vec::new();
    for _ in 0..n {
        input.extend_from_slice(POST_WITH_LENGTH);
    }
    let (conn, factory) = run(&input);
    assert_eq!(conn.requests_completed(), n);
    assert_eq!(conn.input_len(), 0);
    assert!(factory.finished().iter().all(|r| r.body == b"hello"));
}

// ============================================================================
// Incremental delivery invariants
// ============================================================================

fn run_split(input: &[u8], split_at: &[usize]) -> (Conn, RecorderFactory) {
    let mut conn = Conn::server(HttpLimits::default());
    let mut factory = RecorderFactory::new();
    let mut last = 0;
    for &pos in split_at {
        conn.feed(&input[last..pos]);
        conn.advance(&mut factory);
        last = pos;
    }
    conn.feed(&input[last..]);
    conn.advance(&mut factory);
    (conn, factory)
}

#[test]
fn byte_at_a_time_equals_single_feed() {
    for input in [MINIMAL_GET, POST_WITH_LENGTH, CHUNKED_POST] {
        let (_, whole) = run(input);
        let splits: Vec<usize> = (1..input.len()).collect();
        let (conn, trickled) = run_split(input, &splits);

        let a = whole.finished();
        let b = trickled.finished();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.method, y.method);
            assert_eq!(x.path_info, y.path_info);
            assert_eq!(x.length, y.length);
            assert_eq!(x.body, y.body);
            assert_eq!(x.eof, y.eof);
        }
        assert_eq!(conn.requests_completed(), 1);
    }
}

#[test]
fn identity_accounting_holds_at_every_suspension() {
    let head = b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 10\r\n\r\n";
    let mut conn = Conn::server(HttpLimits::default());
    let mut factory = RecorderFactory::new();
    conn.feed(head);
    conn.advance(&mut factory);

    for piece in [&b"01"[..], b"234", b"5678", b"9"] {
        conn.feed(piece);
        conn.advance(&mut factory);
        if let Some(rx) = conn.rx() {
            assert_eq!(rx.remaining_content + rx.received_content, rx.length);
        }
    }
    assert_eq!(conn.requests_completed(), 1);
    assert_eq!(factory.finished()[0].body, b"0123456789");
}

#[test]
fn chunked_bytes_delivered_in_order() {
    let chunks: &[&[u8]] = &[b"alpha", b"beta", b"gamma-delta"];
    let mut input = b"POST / HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for chunk in chunks {
        input.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        input.extend_from_slice(chunk);
        input.extend_from_slice(b"\r\n");
    }
    input.extend_from_slice(b"0\r\n\r\n");

    let (_, factory) = run(&input);
    let expected: Vec<u8> = chunks.concat();
    assert_eq!(factory.finished()[0].body, expected);
}

proptest! {
    #[test]
    fn arbitrary_splits_preserve_chunked_body(split in 1usize..CHUNKED_POST.len()) {
        let (_, factory) = run_split(CHUNKED_POST, &[split]);
        let finished = factory.finished();
        prop_assert_eq!(finished.len(), 1);
        prop_assert_eq!(&finished[0].body, b"hello world");
    }
}
