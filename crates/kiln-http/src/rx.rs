//! Request context: the parsed state of one inbound message.
//!
//! An `Rx` exists from the moment a header block parses until the request
//! completes. It owns the header map, etag list and range list; its
//! back-reference to the connection is implicit (the connection owns the
//! Rx, never the reverse).

use crate::auth::AuthChallenge;
use crate::chunk::ChunkState;
use crate::error::{code, HttpError};
use crate::headers::HeaderMap;
use crate::method::Method;
use crate::range::ByteRange;
use crate::tx::Tx;
use crate::uri::{self, ParsedUri};
use std::time::SystemTime;

/// Sentinel content length for chunked and HTTP/1.0 body-to-close framing.
pub const CONTENT_LENGTH_UNBOUNDED: i64 = i64::MAX;

/// Parsed-request state for one message on a connection.
#[derive(Debug)]
pub struct Rx {
    /// Request method. `None` until the request line parses.
    pub method: Option<Method>,
    /// Method bit from [`Method::bit`], zero until parsed.
    pub method_flags: u32,
    /// Raw request URI as received.
    pub uri: String,
    /// Parsed form of the URI.
    pub parsed_uri: Option<ParsedUri>,
    /// Decoded, normalized path. Handlers may rewrite the split between
    /// `script_name` and `path_info`.
    pub path_info: String,
    /// Script prefix, empty until a handler claims one.
    pub script_name: String,

    /// Declared content length: `-1` if absent, [`CONTENT_LENGTH_UNBOUNDED`]
    /// for chunked or HTTP/1.0 body-to-close.
    pub length: i64,
    /// Body bytes still expected. For chunked framing this counts within
    /// the current chunk.
    pub remaining_content: i64,
    /// Body bytes received so far.
    pub received_content: i64,
    /// Transfer-Encoding: chunked.
    pub chunked: bool,
    /// Chunk decoder state.
    pub chunk_state: ChunkState,
    /// End of body reached.
    pub eof: bool,

    /// Case-insensitive, order-preserving header map.
    pub headers: HeaderMap,
    /// Raw bytes of the originating header block, for tracing and
    /// diagnostics.
    pub header_block: Vec<u8>,

    /// True once any conditional header was seen.
    pub conditional: bool,
    /// Etags from If-Match / If-None-Match / If-Range.
    pub etags: Vec<String>,
    /// Polarity of the etag condition: true for If-Match.
    pub if_match: bool,
    /// Polarity of the date condition: true for If-Modified-Since.
    pub if_modified: bool,
    /// Date from If-Modified-Since / If-Unmodified-Since.
    pub since: Option<SystemTime>,

    /// Ranges requested for the response body.
    pub ranges: Vec<ByteRange>,
    /// Span of an uploaded body portion, from Content-Range.
    pub input_range: Option<ByteRange>,

    /// Client role: response status code.
    pub status: u16,
    /// Client role: response reason phrase.
    pub status_message: String,
    /// Client role: parsed WWW-Authenticate challenge.
    pub challenge: Option<AuthChallenge>,

    /// Folded Cookie header value.
    pub cookie: Option<String>,
    /// Host header value.
    pub host_header: Option<String>,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// Referer header value.
    pub referer: Option<String>,
    /// Location header value (client role).
    pub redirect: Option<String>,
    /// Pragma header value.
    pub pragma: Option<String>,
    /// Connection header value.
    pub connection: Option<String>,
    /// Accept header value.
    pub accept: Option<String>,
    /// Accept-Charset header value.
    pub accept_charset: Option<String>,
    /// Accept-Encoding header value.
    pub accept_encoding: Option<String>,
    /// Content-Type, with parameters.
    pub mime_type: String,
    /// Content-Type is a url-encoded form post.
    pub form: bool,

    /// Authorization scheme, lowercased.
    pub auth_type: Option<String>,
    /// Authorization credentials following the scheme.
    pub auth_details: Option<String>,
}

impl Default for Rx {
    fn default() -> Self {
        Self::new()
    }
}

impl Rx {
    /// Creates a fresh request context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            method: None,
            method_flags: 0,
            uri: String::new(),
            parsed_uri: None,
            path_info: "/".to_string(),
            script_name: String::new(),
            length: -1,
            remaining_content: 0,
            received_content: 0,
            chunked: false,
            chunk_state: ChunkState::Start,
            eof: false,
            headers: HeaderMap::new(),
            header_block: Vec::new(),
            conditional: false,
            etags: Vec::new(),
            if_match: true,
            if_modified: true,
            since: None,
            ranges: Vec::new(),
            input_range: None,
            status: 0,
            status_message: String::new(),
            challenge: None,
            cookie: None,
            host_header: None,
            user_agent: None,
            referer: None,
            redirect: None,
            pragma: None,
            connection: None,
            accept: None,
            accept_charset: None,
            accept_encoding: None,
            mime_type: String::new(),
            form: false,
            auth_type: None,
            auth_details: None,
        }
    }

    /// Parses and installs the request URI.
    ///
    /// Stores the parsed form, copies its extension into the transmit
    /// context, URL-decodes and normalizes the path into `path_info`, and
    /// resets `script_name`.
    ///
    /// # Errors
    ///
    /// Returns a 400 protocol error on a malformed URI.
    pub fn set_uri(&mut self, raw: &str, tx: &mut Tx) -> Result<(), HttpError> {
        let parsed = ParsedUri::parse(raw)
            .ok_or_else(|| HttpError::protocol(code::BAD_REQUEST, "Bad URL format"))?;
        self.uri = parsed.uri.clone();
        tx.extension = parsed.ext.clone();
        self.path_info = uri::normalize(&uri::decode(&parsed.path));
        self.script_name = String::new();
        self.parsed_uri = Some(parsed);
        Ok(())
    }

    /// Looks up a header value, case-insensitively.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Adds an etag to the match list.
    pub fn add_match_etag(&mut self, etag: &str) {
        self.etags.push(etag.to_string());
    }

    /// Matches the entity's etag against the request's etag conditions.
    ///
    /// With no etag conditions present every entity matches. The result is
    /// true when the conditional allows skipping the transfer: an
    /// `If-None-Match` hit, or an `If-Match` miss.
    #[must_use]
    pub fn match_etag(&self, entity_etag: Option<&str>) -> bool {
        if self.etags.is_empty() {
            return true;
        }
        let Some(entity_etag) = entity_etag else {
            return false;
        };
        for tag in &self.etags {
            if tag == entity_etag {
                return !self.if_match;
            }
        }
        self.if_match
    }

    /// Evaluates the If-Modified-Since / If-Unmodified-Since condition
    /// against the entity's modification time. True when the condition
    /// allows skipping the transfer.
    #[must_use]
    pub fn match_modified(&self, modified: SystemTime) -> bool {
        match self.since {
            None => true,
            Some(since) => {
                if self.if_modified {
                    modified <= since
                } else {
                    modified > since
                }
            }
        }
    }
}
