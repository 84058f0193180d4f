//! Connection state machine.
//!
//! A connection drives every request through BEGIN → PARSED → CONTENT →
//! RUNNING → COMPLETE. [`Conn::advance`] loops until no state can make
//! progress, then returns to the event loop; the next readable or writable
//! event re-enters it. The machine is re-entrant and never blocks: each
//! state reports whether the driver can proceed, and suspension happens
//! only between whole logical units (a head, a chunk header, a body slice).
//!
//! Completion is the one place a single event may advance more than one
//! request: if unread pipelined bytes remain after a request is destroyed,
//! the completion step reports progress and the loop immediately starts
//! parsing the next request without another trip through the event loop.

use crate::buffer::InputBuffer;
use crate::chunk::{scan_chunk_header, ChunkState};
use crate::error::{code, status_text, HttpError};
use crate::limits::HttpLimits;
use crate::packet::{Packet, RecvQueue};
use crate::parser::{parse_head, ParseOutcome};
use crate::pipeline::{PipelineFactory, Pipeline, Verdict};
use crate::rx::{Rx, CONTENT_LENGTH_UNBOUNDED};
use crate::tx::Tx;
use tracing::{debug, trace};

/// Connection lifecycle states, in order. A request never revisits an
/// earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnState {
    /// No request in flight.
    Begin,
    /// Socket accepted, nothing parsed yet.
    Connected,
    /// Request head parsed.
    Parsed,
    /// Consuming body content.
    Content,
    /// Handler pipeline running.
    Running,
    /// Request finished; pipelining decision pending.
    Complete,
}

/// Which side of the exchange this connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnRole {
    /// Parses request heads, serves responses.
    Server,
    /// Parses response heads.
    Client,
}

enum Analyse {
    Progress,
    NeedMore,
    Declined,
    Failed(HttpError),
}

/// One HTTP/1.x connection: socket-facing input buffer, current request
/// and transmit contexts, and the state machine that ties them together.
pub struct Conn {
    role: ConnRole,
    state: ConnState,
    limits: HttpLimits,

    input: InputBuffer,
    rx: Option<Rx>,
    tx: Option<Tx>,
    recv: RecvQueue,
    pipeline: Option<Box<dyn Pipeline>>,

    keep_alive_count: i32,
    http10: bool,

    error: bool,
    conn_error: bool,
    abort_pipeline: bool,
    error_status: Option<(u16, String)>,
    last_error: Option<(u16, String)>,
    output: Vec<u8>,

    advancing: bool,
    can_proceed: bool,
    complete: bool,
    write_complete: bool,
    write_blocked: bool,
    end_sent: bool,

    requests_completed: u64,
}

impl Conn {
    /// Creates a server-side connection.
    #[must_use]
    pub fn server(limits: HttpLimits) -> Self {
        Self::new(ConnRole::Server, limits)
    }

    /// Creates a client-side connection.
    #[must_use]
    pub fn client(limits: HttpLimits) -> Self {
        Self::new(ConnRole::Client, limits)
    }

    fn new(role: ConnRole, limits: HttpLimits) -> Self {
        let recv = RecvQueue::new(limits.receive_queue_max);
        let keep_alive_count = limits.max_keep_alive;
        Self {
            role,
            state: ConnState::Begin,
            limits,
            input: InputBuffer::new(),
            rx: None,
            tx: None,
            recv,
            pipeline: None,
            keep_alive_count,
            http10: false,
            error: false,
            conn_error: false,
            abort_pipeline: false,
            error_status: None,
            last_error: None,
            output: Vec::new(),
            advancing: false,
            can_proceed: false,
            complete: false,
            write_complete: false,
            write_blocked: false,
            end_sent: false,
            requests_completed: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Marks the socket accepted.
    pub fn set_connected(&mut self) {
        if self.state == ConnState::Begin {
            self.state = ConnState::Connected;
        }
    }

    /// The request context, once a head has begun parsing.
    #[must_use]
    pub fn rx(&self) -> Option<&Rx> {
        self.rx.as_ref()
    }

    /// The transmit context.
    #[must_use]
    pub fn tx_mut(&mut self) -> Option<&mut Tx> {
        self.tx.as_mut()
    }

    /// True once a connection-fatal error latched.
    #[must_use]
    pub fn conn_error(&self) -> bool {
        self.conn_error
    }

    /// True while the current request is in error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error
    }

    /// True when the connection may serve another request.
    #[must_use]
    pub fn keep_alive(&self) -> bool {
        !self.conn_error && self.keep_alive_count > 0
    }

    /// True while a pipeline stage is stalled on a full write sink.
    #[must_use]
    pub fn is_write_blocked(&self) -> bool {
        self.write_blocked
    }

    /// Number of requests that reached COMPLETE.
    #[must_use]
    pub fn requests_completed(&self) -> u64 {
        self.requests_completed
    }

    /// Bytes buffered but not yet consumed.
    #[must_use]
    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    /// Takes the status and message of the most recently completed
    /// request error.
    #[must_use]
    pub fn take_error(&mut self) -> Option<(u16, String)> {
        self.last_error.take()
    }

    /// Takes all flushable output: completed responses (including
    /// rendered error responses) followed by anything the current
    /// pipeline has staged.
    #[must_use]
    pub fn take_output(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.output);
        if !self.error {
            if let Some(tx) = self.tx.as_mut() {
                out.append(&mut tx.output);
            }
        }
        out
    }

    /// Appends bytes read from the socket.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// The socket became writable again; clears the write block.
    pub fn notify_writable(&mut self) {
        self.write_blocked = false;
        if let Some(tx) = self.tx.as_mut() {
            tx.write_blocked = false;
        }
    }

    /// The peer closed its sending side.
    ///
    /// An HTTP/1.0 body-to-close request ends cleanly here; any other
    /// request cut off mid-body latches a connection error.
    pub fn input_closed(&mut self, factory: &mut dyn PipelineFactory) {
        if let Some(rx) = self.rx.as_mut() {
            if !rx.eof {
                if !rx.chunked && rx.length == CONTENT_LENGTH_UNBOUNDED {
                    rx.remaining_content = 0;
                } else {
                    self.conn_error = true;
                }
            }
        }
        self.keep_alive_count = -1;
        if self.state < ConnState::Complete && !self.advancing {
            self.advance(factory);
        }
    }

    /// Drives the state machine until no state can make progress.
    ///
    /// Re-entrant: call after every readable or writable event.
    pub fn advance(&mut self, factory: &mut dyn PipelineFactory) {
        self.can_proceed = true;
        self.advancing = true;
        while self.can_proceed {
            trace!(state = ?self.state, error = self.error, "advance");
            self.can_proceed = match self.state {
                ConnState::Begin | ConnState::Connected => self.parse_incoming(factory),
                ConnState::Parsed => self.process_parsed(),
                ConnState::Content => self.process_content(),
                ConnState::Running => self.process_running(),
                ConnState::Complete => self.process_completion(factory),
            };
        }
        self.advancing = false;
    }

    /// BEGIN/CONNECTED: parse a message head once the terminator arrives.
    fn parse_incoming(&mut self, factory: &mut dyn PipelineFactory) -> bool {
        if self.rx.is_none() {
            if self.input.is_empty() {
                return false;
            }
            if self.role == ConnRole::Server && !factory.validate_open() {
                self.rx = Some(Rx::new());
                self.tx = Some(Tx::new());
                self.request_error(HttpError::limit(code::SERVICE_UNAVAILABLE, "Server busy"));
                self.state = ConnState::Parsed;
                return true;
            }
            self.rx = Some(Rx::new());
            self.tx = Some(Tx::new());
        }

        let server = self.role == ConnRole::Server;
        let rx = self.rx.as_mut().expect("rx exists");
        let tx = self.tx.as_mut().expect("tx exists");
        match parse_head(server, &mut self.input, rx, tx, &self.limits) {
            Ok(ParseOutcome::NeedMore) => false,
            Ok(ParseOutcome::Interim) => {
                // 1xx responses are consumed whole; keep waiting for the
                // final status on a fresh context.
                self.rx = Some(Rx::new());
                self.tx = Some(Tx::new());
                true
            }
            Ok(ParseOutcome::Head(summary)) => {
                if summary.http10 {
                    self.http10 = true;
                }
                if let Some(forced) = summary.keep_alive {
                    self.keep_alive_count = forced;
                }
                self.state = ConnState::Parsed;
                if !self.error {
                    let rx = self.rx.as_mut().expect("rx exists");
                    let tx = self.tx.as_mut().expect("tx exists");
                    match factory.create(rx, tx) {
                        Ok(pipeline) => self.pipeline = Some(pipeline),
                        Err(err) => self.request_error(err),
                    }
                }
                true
            }
            Err(err) => {
                self.request_error(err);
                self.state = ConnState::Parsed;
                true
            }
        }
    }

    /// PARSED: start the pipeline, then move to CONTENT unconditionally.
    fn process_parsed(&mut self) -> bool {
        let mut failure = None;
        if !self.abort_pipeline {
            if let (Some(pipeline), Some(rx), Some(tx)) =
                (self.pipeline.as_mut(), self.rx.as_mut(), self.tx.as_mut())
            {
                match pipeline.start(rx, tx) {
                    Err(err) => failure = Some(err),
                    Ok(()) => {
                        if !self.error && !self.write_complete && rx.remaining_content == 0 {
                            pipeline.writable(rx, tx);
                        }
                    }
                }
            }
        }
        if let Some(err) = failure {
            self.request_error(err);
        }
        self.state = ConnState::Content;
        true
    }

    /// CONTENT: consume body bytes until the framing says the body ended.
    fn process_content(&mut self) -> bool {
        let Some(rx) = self.rx.as_ref() else {
            self.state = ConnState::Running;
            return true;
        };
        if self.complete || self.conn_error || rx.eof || body_done(rx) {
            self.finish_content();
            return true;
        }
        if self.input.is_empty() {
            return false;
        }
        match self.analyse_content() {
            Analyse::Failed(err) => {
                self.request_error(err);
                if self.conn_error {
                    self.finish_content();
                    return true;
                }
                // Let the loop re-enter to discard the rest of the body.
                return !self.input.is_empty();
            }
            Analyse::NeedMore | Analyse::Declined => {
                if self.conn_error {
                    self.finish_content();
                    return true;
                }
                return false;
            }
            Analyse::Progress => {}
        }
        let rx = self.rx.as_ref().expect("rx exists");
        if body_done(rx) {
            self.finish_content();
            return true;
        }
        self.conn_error || !self.input.is_empty()
    }

    /// Emits the end-of-stream marker and moves to RUNNING.
    fn finish_content(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if !self.error && !self.conn_error && !self.end_sent && body_done(rx) {
                rx.eof = true;
                self.recv.push(Packet::End);
                self.end_sent = true;
            }
        }
        self.state = ConnState::Running;
    }

    /// One unit of body analysis: a chunk header, then a payload slice.
    fn analyse_content(&mut self) -> Analyse {
        let rx = self.rx.as_mut().expect("rx exists");

        if rx.chunked && rx.chunk_state == ChunkState::Start {
            match scan_chunk_header(self.input.as_slice()) {
                Err(err) => return Analyse::Failed(err),
                Ok(None) => return Analyse::NeedMore,
                Ok(Some(header)) => {
                    self.input.advance(header.header_len);
                    if header.size == 0 {
                        rx.chunk_state = ChunkState::Eof;
                        rx.remaining_content = 0;
                        return Analyse::Progress;
                    }
                    rx.chunk_state = ChunkState::Data;
                    rx.remaining_content = header.size as i64;
                }
            }
        }

        let nbytes = rx.remaining_content.min(self.input.len() as i64).max(0) as usize;
        if nbytes == 0 {
            return Analyse::NeedMore;
        }
        if !self.error && self.recv.would_exceed(nbytes) {
            // Backpressure: decline and let the handler drain the queue.
            return Analyse::Declined;
        }

        let payload = self.input.take(nbytes);
        rx.remaining_content -= nbytes as i64;
        rx.received_content += nbytes as i64;
        if rx.chunked && rx.remaining_content == 0 {
            rx.chunk_state = ChunkState::Start;
        }
        if rx.received_content >= self.limits.receive_body_size as i64 {
            return Analyse::Failed(HttpError::limit(
                code::REQUEST_TOO_LARGE,
                format!(
                    "Request content body of {} bytes is too big, limit {}",
                    rx.received_content, self.limits.receive_body_size
                ),
            ));
        }
        if self.error {
            // Discard input data once the request has an error.
            return Analyse::Progress;
        }
        self.recv.push(Packet::Data(payload));
        Analyse::Progress
    }

    /// RUNNING: hand the exchange to the pipeline.
    fn process_running(&mut self) -> bool {
        if self.abort_pipeline || self.pipeline.is_none() {
            self.state = ConnState::Complete;
            return true;
        }
        let pipeline = self.pipeline.as_mut().expect("pipeline exists");
        let rx = self.rx.as_mut().expect("rx exists");
        let tx = self.tx.as_mut().expect("tx exists");

        match self.role {
            ConnRole::Server => {
                match pipeline.process(rx, tx, &mut self.recv) {
                    Verdict::Complete => self.complete = true,
                    Verdict::WriteComplete => self.write_complete = true,
                    Verdict::Pending => {}
                }
                if tx.write_blocked {
                    self.write_blocked = true;
                }
                if self.complete || self.write_complete || self.error {
                    self.state = ConnState::Complete;
                    true
                } else {
                    pipeline.writable(rx, tx);
                    false
                }
            }
            ConnRole::Client => {
                let _ = pipeline.process(rx, tx, &mut self.recv);
                pipeline.finalize(rx, tx);
                self.complete = true;
                self.state = ConnState::Complete;
                true
            }
        }
    }

    /// COMPLETE: destroy the request context; report whether buffered
    /// pipelined input lets the machine start the next request now.
    fn process_completion(&mut self, factory: &mut dyn PipelineFactory) -> bool {
        let more = !self.input.is_empty() && !self.conn_error;
        if self.role == ConnRole::Client {
            return false;
        }

        factory.request_complete();
        if let Some(mut tx) = self.tx.take() {
            if self.error {
                // Partial output from an aborted pipeline is not flushed.
                tx.output.clear();
            } else {
                self.output.append(&mut tx.output);
            }
        }
        if let Some((status, message)) = self.error_status.take() {
            self.render_error(status, &message);
            self.last_error = Some((status, message));
        }
        self.rx = None;
        self.pipeline = None;
        // The receive queue is per-request; drop anything a handler left.
        self.recv.clear();
        self.requests_completed += 1;
        if self.keep_alive_count > 0 {
            self.keep_alive_count -= 1;
        }

        self.error = false;
        self.abort_pipeline = false;
        self.complete = false;
        self.write_complete = false;
        self.write_blocked = false;
        self.end_sent = false;

        self.state = ConnState::Begin;
        more
    }

    /// Renders the bare error response for an aborted request.
    fn render_error(&mut self, status: u16, message: &str) {
        let close = self.conn_error || self.keep_alive_count <= 1;
        let protocol = if self.http10 { "HTTP/1.0" } else { "HTTP/1.1" };
        let reason = status_text(status);
        let body = format!("{status} {reason}: {message}\n");
        let connection = if close { "Connection: close\r\n" } else { "" };
        let head = format!(
            "{protocol} {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n{connection}\r\n",
            body.len()
        );
        self.output.extend_from_slice(head.as_bytes());
        self.output.extend_from_slice(body.as_bytes());
    }

    fn request_error(&mut self, err: HttpError) {
        debug!(%err, "request error");
        if self.error_status.is_none() {
            self.error_status = Some((err.status(), err.message().to_string()));
        }
        self.error = true;
        self.abort_pipeline = true;
        if err.is_connection_fatal() {
            self.conn_error = true;
            self.keep_alive_count = -1;
        }
    }
}

fn body_done(rx: &Rx) -> bool {
    if rx.chunked {
        rx.chunk_state == ChunkState::Eof
    } else {
        rx.remaining_content <= 0
    }
}
