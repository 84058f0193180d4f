//! Start-line and header-block parsing.
//!
//! Parsing is gated on the header terminator: nothing is consumed until the
//! input buffer holds a complete `CRLF CRLF`-terminated head, so the parser
//! never suspends mid-line. Header keys are lowercased and folded into the
//! request's header map while a per-key dispatch extracts the fields the
//! state machine acts on.

use crate::buffer::{token, InputBuffer};
use crate::chunk::ChunkState;
use crate::error::{code, HttpError};
use crate::limits::HttpLimits;
use crate::method::Method;
use crate::range::{parse_content_range, parse_range_header};
use crate::rx::{Rx, CONTENT_LENGTH_UNBOUNDED};
use crate::tx::Tx;
use crate::auth::AuthChallenge;
use tracing::{debug, trace};

/// Header-block terminator.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Bytes a header key may never contain.
const BAD_KEY_BYTES: &[u8] = b"%<>/\\";

/// Outcome of a head parse attempt.
#[derive(Debug)]
pub(crate) enum ParseOutcome {
    /// The terminator is not buffered yet; nothing was consumed.
    NeedMore,
    /// A complete head was parsed.
    Head(HeadSummary),
    /// Client role: a 1xx interim response was consumed whole.
    Interim,
}

/// Connection-level facts extracted from a parsed head.
#[derive(Debug, Default)]
pub(crate) struct HeadSummary {
    /// The peer speaks HTTP/1.0.
    pub http10: bool,
    /// Forced keep-alive count: `Some(0)` disables reuse, `Some(-1)`
    /// demands an immediate close.
    pub keep_alive: Option<i32>,
}

/// Parses one message head out of `input` into `rx`/`tx`.
///
/// Consumes the head on success. For chunked framing the final CRLF of the
/// terminator is left in the buffer so the first chunk header scans as a
/// self-contained `CRLF size CRLF` unit.
pub(crate) fn parse_head(
    server: bool,
    input: &mut InputBuffer,
    rx: &mut Rx,
    tx: &mut Tx,
    limits: &HttpLimits,
) -> Result<ParseOutcome, HttpError> {
    if input.is_empty() {
        return Ok(ParseOutcome::NeedMore);
    }
    let Some(head_len) = input.find(HEADER_TERMINATOR) else {
        if input.len() >= limits.header_size {
            return Err(HttpError::limit(code::REQUEST_TOO_LARGE, "Header too big"));
        }
        return Ok(ParseOutcome::NeedMore);
    };
    if head_len >= limits.header_size {
        return Err(HttpError::limit(code::REQUEST_TOO_LARGE, "Header too big"));
    }

    // Take the head through the first CRLF of the terminator; the second
    // stays buffered until we know whether the body is chunked.
    let block = input.take(head_len + 2);
    let mut cursor: &[u8] = &block;

    let mut summary = HeadSummary::default();
    if server {
        parse_request_line(&mut cursor, rx, tx, limits, &mut summary)?;
    } else {
        parse_response_line(&mut cursor, rx, limits)?;
    }
    let directives = parse_headers(&mut cursor, server, rx, tx, limits);

    if rx.chunked {
        rx.length = CONTENT_LENGTH_UNBOUNDED;
        rx.remaining_content = CONTENT_LENGTH_UNBOUNDED;
        rx.chunk_state = ChunkState::Start;
    } else {
        // Step over the final CRLF of the terminator. This happens on the
        // error path too, so a request-level error leaves the buffer
        // aligned on the next pipelined request.
        input.advance(2);
    }
    let directives = directives?;
    if summary.http10
        && rx.length < 0
        && rx.method.is_some_and(Method::expects_body)
    {
        // No framing on an HTTP/1.0 body: it runs to connection close.
        rx.length = CONTENT_LENGTH_UNBOUNDED;
    }

    summary.keep_alive = match directives {
        ConnectionDirectives { close: true, .. } => Some(-1),
        ConnectionDirectives { last_request: true, .. } => Some(0),
        ConnectionDirectives { keep_alive: false, .. } if summary.http10 => Some(0),
        _ => None,
    };

    if rx.remaining_content == 0 {
        rx.eof = true;
    }

    trace!(headers = rx.headers.len(), "parsed header block");
    rx.header_block = block;

    if !server && rx.status >= 100 && rx.status < 200 {
        return Ok(ParseOutcome::Interim);
    }
    Ok(ParseOutcome::Head(summary))
}

fn parse_request_line(
    cursor: &mut &[u8],
    rx: &mut Rx,
    tx: &mut Tx,
    limits: &HttpLimits,
    summary: &mut HeadSummary,
) -> Result<(), HttpError> {
    let method_tok = token(cursor, b" ");
    let method = Method::from_bytes(method_tok)
        .ok_or_else(|| HttpError::protocol(code::BAD_REQUEST, "Unknown method"))?;

    let uri_tok = token(cursor, b" ");
    if uri_tok.is_empty() {
        return Err(HttpError::protocol(code::BAD_REQUEST, "Empty URI"));
    }
    if uri_tok.len() >= limits.uri_size {
        return Err(HttpError::limit(code::URI_TOO_LARGE, "URI too long"));
    }

    let protocol_tok = token(cursor, b"\r\n");
    if protocol_tok == b"HTTP/1.0" {
        summary.http10 = true;
        if method.expects_body() {
            rx.remaining_content = CONTENT_LENGTH_UNBOUNDED;
        }
    } else if protocol_tok != b"HTTP/1.1" {
        return Err(HttpError::protocol(
            code::NOT_ACCEPTABLE,
            "Unsupported HTTP protocol",
        ));
    }

    rx.method = Some(method);
    rx.method_flags = method.bit();
    tx.method = Some(method);

    let uri = std::str::from_utf8(uri_tok)
        .map_err(|_| HttpError::protocol(code::BAD_REQUEST, "Bad URL format"))?;
    rx.set_uri(uri, tx)?;

    debug!(
        "{} {} {}",
        method,
        rx.uri,
        if summary.http10 { "HTTP/1.0" } else { "HTTP/1.1" }
    );
    Ok(())
}

fn parse_response_line(
    cursor: &mut &[u8],
    rx: &mut Rx,
    limits: &HttpLimits,
) -> Result<(), HttpError> {
    let protocol_tok = token(cursor, b" ");
    if protocol_tok != b"HTTP/1.1" && protocol_tok != b"HTTP/1.0" {
        return Err(HttpError::protocol(
            code::NOT_ACCEPTABLE,
            "Unsupported HTTP protocol",
        ));
    }

    let status_tok = token(cursor, b" ");
    let status = std::str::from_utf8(status_tok)
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| {
            HttpError::protocol(code::NOT_ACCEPTABLE, "Bad response status code")
        })?;
    rx.status = status;

    let message = token(cursor, b"\r\n");
    if message.len() >= limits.uri_size {
        return Err(HttpError::limit(code::URI_TOO_LARGE, "Status message too long"));
    }
    rx.status_message = String::from_utf8_lossy(message).into_owned();

    debug!("response {} {}", rx.status, rx.status_message);
    Ok(())
}

#[derive(Debug, Default)]
struct ConnectionDirectives {
    keep_alive: bool,
    close: bool,
    last_request: bool,
}

fn parse_headers(
    cursor: &mut &[u8],
    server: bool,
    rx: &mut Rx,
    tx: &mut Tx,
    limits: &HttpLimits,
) -> Result<ConnectionDirectives, HttpError> {
    let mut directives = ConnectionDirectives::default();
    let mut count = 0usize;

    while !cursor.is_empty() {
        if count >= limits.header_count {
            return Err(HttpError::limit(code::BAD_REQUEST, "Too many headers"));
        }
        let key = token(cursor, b":");
        if key.is_empty() || key.iter().any(|b| *b == b'\r' || *b == b'\n') {
            return Err(HttpError::protocol(code::BAD_REQUEST, "Bad header format"));
        }
        if key.iter().any(|b| BAD_KEY_BYTES.contains(b)) {
            return Err(HttpError::protocol(code::BAD_REQUEST, "Bad header key value"));
        }
        let key = std::str::from_utf8(key)
            .map_err(|_| HttpError::protocol(code::BAD_REQUEST, "Bad header format"))?;
        let key = key.trim().to_ascii_lowercase();

        let value_tok = token(cursor, b"\r\n");
        let value = String::from_utf8_lossy(value_tok);
        let value = value.trim_start_matches([' ', '\t']);
        count += 1;

        rx.headers.append(&key, value);
        apply_header(&key, value, server, rx, tx, limits, &mut directives)?;
    }
    Ok(directives)
}

#[allow(clippy::too_many_lines)]
fn apply_header(
    key: &str,
    value: &str,
    server: bool,
    rx: &mut Rx,
    tx: &mut Tx,
    limits: &HttpLimits,
    directives: &mut ConnectionDirectives,
) -> Result<(), HttpError> {
    match key {
        "authorization" => {
            let (scheme, details) = value
                .split_once(char::is_whitespace)
                .unwrap_or((value, ""));
            rx.auth_type = Some(scheme.to_ascii_lowercase());
            rx.auth_details = Some(details.trim_start().to_string());
        }
        "accept" => rx.accept = Some(value.to_string()),
        "accept-charset" => rx.accept_charset = Some(value.to_string()),
        "accept-encoding" => rx.accept_encoding = Some(value.to_string()),

        "content-length" => {
            if rx.length >= 0 {
                return Err(HttpError::protocol(
                    code::BAD_REQUEST,
                    "Multiple content length headers",
                ));
            }
            if rx.chunked {
                return Err(HttpError::protocol(
                    code::BAD_REQUEST,
                    "Content length conflicts with chunked transfer encoding",
                ));
            }
            let length: i64 = value
                .trim()
                .parse()
                .map_err(|_| HttpError::protocol(code::BAD_REQUEST, "Bad content length"))?;
            if length < 0 {
                return Err(HttpError::protocol(code::BAD_REQUEST, "Bad content length"));
            }
            if length as u64 >= limits.receive_body_size {
                return Err(HttpError::limit(
                    code::REQUEST_TOO_LARGE,
                    format!(
                        "Request content length {length} bytes is too big, limit {}",
                        limits.receive_body_size
                    ),
                ));
            }
            rx.length = length;
            if server || tx.method != Some(Method::Head) {
                rx.remaining_content = length;
            }
        }
        "content-range" => {
            rx.input_range = Some(parse_content_range(value)?);
        }
        "content-type" => {
            rx.mime_type = value.to_string();
            rx.form = value.contains("application/x-www-form-urlencoded");
        }
        "cookie" => match &mut rx.cookie {
            Some(cookie) => {
                cookie.push_str("; ");
                cookie.push_str(value);
            }
            None => rx.cookie = Some(value.to_string()),
        },
        "connection" => {
            rx.connection = Some(value.to_string());
            if value.eq_ignore_ascii_case("keep-alive") {
                directives.keep_alive = true;
            } else if value.eq_ignore_ascii_case("close") {
                directives.close = true;
            }
        }

        "host" => rx.host_header = Some(value.to_string()),

        "if-modified-since" | "if-unmodified-since" => {
            let date = value.split(';').next().unwrap_or("").trim();
            if let Ok(since) = httpdate::parse_http_date(date) {
                rx.since = Some(since);
                rx.if_modified = key == "if-modified-since";
                rx.conditional = true;
            }
        }
        "if-match" | "if-none-match" => {
            let list = value.split(';').next().unwrap_or("");
            rx.if_match = key == "if-match";
            rx.conditional = true;
            for word in list.split([' ', ',']).filter(|w| !w.is_empty()) {
                rx.add_match_etag(word);
            }
        }
        "if-range" => {
            let list = value.split(';').next().unwrap_or("");
            rx.if_match = true;
            rx.conditional = true;
            for word in list.split([' ', ',']).filter(|w| !w.is_empty()) {
                rx.add_match_etag(word);
            }
        }

        "keep-alive" => {
            // `Keep-Alive: timeout=N, max=1` announces the client's last
            // request; closing now gives a client-led termination and
            // relieves server-side TIME_WAIT.
            let v = value.as_bytes();
            if v.len() > 2
                && v[v.len() - 1] == b'1'
                && v[v.len() - 2] == b'='
                && v[v.len() - 3].eq_ignore_ascii_case(&b'x')
            {
                directives.last_request = true;
            }
        }

        "location" => rx.redirect = Some(value.to_string()),
        "pragma" => rx.pragma = Some(value.to_string()),

        "range" => {
            rx.ranges = parse_range_header(value)?;
        }
        "referer" => rx.referer = Some(value.to_string()),

        "transfer-encoding" => {
            if value.to_ascii_lowercase().contains("chunked") {
                if rx.length >= 0 {
                    return Err(HttpError::protocol(
                        code::BAD_REQUEST,
                        "Content length conflicts with chunked transfer encoding",
                    ));
                }
                rx.chunked = true;
            }
        }

        "user-agent" => rx.user_agent = Some(value.to_string()),

        "www-authenticate" => {
            if !server {
                rx.challenge = Some(AuthChallenge::parse(value)?);
            }
        }

        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkState;

    fn parse(server: bool, bytes: &[u8]) -> Result<(Rx, Tx, ParseOutcome), HttpError> {
        let mut input = InputBuffer::new();
        input.extend(bytes);
        let mut rx = Rx::new();
        let mut tx = Tx::new();
        let limits = HttpLimits::default();
        let outcome = parse_head(server, &mut input, &mut rx, &mut tx, &limits)?;
        Ok((rx, tx, outcome))
    }

    fn parse_request(bytes: &[u8]) -> Result<(Rx, Tx, ParseOutcome), HttpError> {
        parse(true, bytes)
    }

    // =========================================================================
    // Request line
    // =========================================================================

    #[test]
    fn minimal_get() {
        let (rx, _, outcome) = parse_request(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert!(matches!(outcome, ParseOutcome::Head(_)));
        assert_eq!(rx.method, Some(Method::Get));
        assert_eq!(rx.path_info, "/");
        assert_eq!(rx.length, -1);
        assert_eq!(rx.remaining_content, 0);
        assert!(rx.eof);
        assert_eq!(rx.host_header.as_deref(), Some("x"));
    }

    #[test]
    fn unknown_method_rejected() {
        let err = parse_request(b"BREW / HTTP/1.1\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn bad_protocol_rejected() {
        let err = parse_request(b"GET / HTTP/2.0\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 406);
    }

    #[test]
    fn uri_too_long_rejected() {
        let uri = format!("/{}", "a".repeat(HttpLimits::default().uri_size));
        let req = format!("GET {uri} HTTP/1.1\r\n\r\n");
        let err = parse_request(req.as_bytes()).unwrap_err();
        assert_eq!(err.status(), 414);
    }

    #[test]
    fn incomplete_head_consumes_nothing() {
        let mut input = InputBuffer::new();
        input.extend(b"GET / HTTP/1.1\r\nHost: x\r\n");
        let mut rx = Rx::new();
        let mut tx = Tx::new();
        let outcome =
            parse_head(true, &mut input, &mut rx, &mut tx, &HttpLimits::default()).unwrap();
        assert!(matches!(outcome, ParseOutcome::NeedMore));
        assert_eq!(input.len(), 25);
    }

    // =========================================================================
    // Headers
    // =========================================================================

    #[test]
    fn content_length_sets_remaining() {
        let (rx, _, _) =
            parse_request(b"POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\n").unwrap();
        assert_eq!(rx.length, 5);
        assert_eq!(rx.remaining_content, 5);
        assert!(!rx.eof);
    }

    #[test]
    fn duplicate_content_length_rejected() {
        let err = parse_request(
            b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 5\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn negative_content_length_rejected() {
        let err =
            parse_request(b"POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn oversized_content_length_rejected() {
        let req = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            HttpLimits::default().receive_body_size
        );
        let err = parse_request(req.as_bytes()).unwrap_err();
        assert_eq!(err.status(), 413);
    }

    #[test]
    fn chunked_with_content_length_rejected() {
        let err = parse_request(
            b"POST / HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err.status(), 400);

        let err = parse_request(
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 5\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn chunked_leaves_final_crlf_buffered() {
        let mut input = InputBuffer::new();
        input.extend(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n");
        let mut rx = Rx::new();
        let mut tx = Tx::new();
        parse_head(true, &mut input, &mut rx, &mut tx, &HttpLimits::default()).unwrap();
        assert!(rx.chunked);
        assert_eq!(rx.chunk_state, ChunkState::Start);
        assert_eq!(rx.length, CONTENT_LENGTH_UNBOUNDED);
        assert!(input.as_slice().starts_with(b"\r\n5\r\n"));
    }

    #[test]
    fn bad_header_key_rejected() {
        let err = parse_request(b"GET / HTTP/1.1\r\nBad<Key>: v\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn missing_colon_rejected() {
        let err = parse_request(b"GET / HTTP/1.1\r\nNoColonHere\r\nHost: x\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn too_many_headers_rejected() {
        let limits = HttpLimits::default().with_header_count(2);
        let mut input = InputBuffer::new();
        input.extend(b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n");
        let mut rx = Rx::new();
        let mut tx = Tx::new();
        let err = parse_head(true, &mut input, &mut rx, &mut tx, &limits).unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(matches!(err, HttpError::Limit { .. }));
    }

    #[test]
    fn oversized_header_block_rejected() {
        let limits = HttpLimits::default().with_header_size(64);
        let mut input = InputBuffer::new();
        input.extend(b"GET / HTTP/1.1\r\n");
        input.extend(&vec![b'a'; 100]);
        let mut rx = Rx::new();
        let mut tx = Tx::new();
        let err = parse_head(true, &mut input, &mut rx, &mut tx, &limits).unwrap_err();
        assert_eq!(err.status(), 413);
    }

    #[test]
    fn duplicate_headers_fold() {
        let (rx, _, _) =
            parse_request(b"GET / HTTP/1.1\r\nAccept: a\r\nAccept: b\r\n\r\n").unwrap();
        assert_eq!(rx.header("accept"), Some("a, b"));
    }

    #[test]
    fn cookies_fold_with_semicolon() {
        let (rx, _, _) =
            parse_request(b"GET / HTTP/1.1\r\nCookie: a=1\r\nCookie: b=2\r\n\r\n").unwrap();
        assert_eq!(rx.cookie.as_deref(), Some("a=1; b=2"));
    }

    #[test]
    fn authorization_splits_scheme() {
        let (rx, _, _) =
            parse_request(b"GET / HTTP/1.1\r\nAuthorization: Basic QWJj\r\n\r\n").unwrap();
        assert_eq!(rx.auth_type.as_deref(), Some("basic"));
        assert_eq!(rx.auth_details.as_deref(), Some("QWJj"));
    }

    #[test]
    fn conditional_headers_captured() {
        let (rx, _, _) = parse_request(
            b"GET / HTTP/1.1\r\nIf-None-Match: \"e1\", \"e2\"; length=5\r\n\r\n",
        )
        .unwrap();
        assert!(rx.conditional);
        assert!(!rx.if_match);
        assert_eq!(rx.etags, ["\"e1\"", "\"e2\""]);
    }

    #[test]
    fn if_modified_since_parses_date() {
        let (rx, _, _) = parse_request(
            b"GET / HTTP/1.1\r\nIf-Modified-Since: Sun, 06 Nov 1994 08:49:37 GMT\r\n\r\n",
        )
        .unwrap();
        assert!(rx.conditional);
        assert!(rx.if_modified);
        assert!(rx.since.is_some());
    }

    #[test]
    fn range_header_parses() {
        let (rx, _, _) =
            parse_request(b"GET / HTTP/1.1\r\nRange: bytes=0-49,200-\r\n\r\n").unwrap();
        assert_eq!(rx.ranges.len(), 2);
        assert_eq!(rx.ranges[0].len, 50);
    }

    #[test]
    fn bad_range_is_416() {
        let err = parse_request(b"GET / HTTP/1.1\r\nRange: bytes=50-10\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 416);
    }

    #[test]
    fn keep_alive_max_one_forces_close() {
        let (_, _, outcome) = parse_request(
            b"GET / HTTP/1.1\r\nKeep-Alive: timeout=5, max=1\r\n\r\n",
        )
        .unwrap();
        match outcome {
            ParseOutcome::Head(summary) => assert_eq!(summary.keep_alive, Some(0)),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn connection_close_detected() {
        let (_, _, outcome) =
            parse_request(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        match outcome {
            ParseOutcome::Head(summary) => assert_eq!(summary.keep_alive, Some(-1)),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn http10_defaults_to_close() {
        let (_, _, outcome) = parse_request(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        match outcome {
            ParseOutcome::Head(summary) => {
                assert!(summary.http10);
                assert_eq!(summary.keep_alive, Some(0));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn http10_keep_alive_header_preserves_reuse() {
        let (_, _, outcome) =
            parse_request(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n").unwrap();
        match outcome {
            ParseOutcome::Head(summary) => assert_eq!(summary.keep_alive, None),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn http10_post_without_length_runs_to_close() {
        let (rx, _, _) = parse_request(b"POST / HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(rx.length, CONTENT_LENGTH_UNBOUNDED);
        assert_eq!(rx.remaining_content, CONTENT_LENGTH_UNBOUNDED);
        assert!(!rx.eof);
    }

    // =========================================================================
    // Response line (client role)
    // =========================================================================

    #[test]
    fn response_line_parses() {
        let (rx, _, outcome) =
            parse(false, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").unwrap();
        assert!(matches!(outcome, ParseOutcome::Head(_)));
        assert_eq!(rx.status, 200);
        assert_eq!(rx.status_message, "OK");
    }

    #[test]
    fn interim_response_detected() {
        let (rx, _, outcome) = parse(false, b"HTTP/1.1 100 Continue\r\n\r\n").unwrap();
        assert!(matches!(outcome, ParseOutcome::Interim));
        assert_eq!(rx.status, 100);
    }

    #[test]
    fn bad_status_rejected() {
        let err = parse(false, b"HTTP/1.1 abc Bad\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 406);
    }

    #[test]
    fn challenge_captured_on_response() {
        let (rx, _, _) = parse(
            false,
            b"HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"r\"\r\n\r\n",
        )
        .unwrap();
        let challenge = rx.challenge.unwrap();
        assert_eq!(challenge.scheme, "basic");
        assert_eq!(challenge.realm.as_deref(), Some("r"));
    }
}
