//! HTTP/1.x message parsing and the per-connection state machine.
//!
//! This crate is the sans-IO core of the kiln server: it turns raw bytes
//! into parsed requests and drives each connection through the
//! BEGIN → PARSED → CONTENT → RUNNING → COMPLETE lifecycle without ever
//! touching a socket. The service layer (`kiln-server`) owns the sockets
//! and feeds bytes in; handlers plug in through the [`Pipeline`] capability
//! set.
//!
//! # Features
//!
//! - Incremental head parsing gated on the `CRLF CRLF` terminator
//! - Identity and chunked body framing, with pipelined-request splitting
//! - Range and Content-Range grammar
//! - Basic and Digest `WWW-Authenticate` / `Authorization` grammar
//! - Configurable limits with precise 4xx classification
//!
//! # Example
//!
//! ```ignore
//! use kiln_http::{Conn, HttpLimits};
//!
//! let mut conn = Conn::server(HttpLimits::default());
//! conn.feed(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
//! conn.advance(&mut factory);
//! ```

#![deny(unsafe_code)]
// Pedantic clippy lints allowed (style suggestions, not correctness issues)
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::single_match_else)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::needless_pass_by_value)]

pub mod auth;
mod buffer;
pub mod chunk;
mod conn;
pub mod error;
mod headers;
mod limits;
mod method;
mod packet;
mod parser;
mod pipeline;
pub mod range;
mod rx;
mod tx;
pub mod uri;

pub use buffer::InputBuffer;
pub use chunk::{scan_chunk_header, ChunkHeader, ChunkState};
pub use conn::{Conn, ConnRole, ConnState};
pub use error::{status_text, HttpError};
pub use headers::HeaderMap;
pub use limits::{
    HttpLimits, DEFAULT_CHUNK_SIZE, DEFAULT_HEADER_COUNT, DEFAULT_HEADER_SIZE,
    DEFAULT_INACTIVITY_TIMEOUT, DEFAULT_MAX_KEEP_ALIVE, DEFAULT_RECEIVE_BODY_SIZE,
    DEFAULT_RECEIVE_QUEUE_MAX, DEFAULT_TIMER_PERIOD, DEFAULT_URI_SIZE,
};
pub use method::{Method, METHOD_MASK_ALL};
pub use packet::{Packet, RecvQueue};
pub use pipeline::{Pipeline, PipelineFactory, Verdict};
pub use range::{parse_content_range, parse_range_header, ByteRange};
pub use rx::{Rx, CONTENT_LENGTH_UNBOUNDED};
pub use tx::Tx;
pub use uri::ParsedUri;
