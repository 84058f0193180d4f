//! Error taxonomy for the protocol core.
//!
//! Errors are classified by how far they propagate: protocol, limit, range
//! and auth errors abort the current request but leave the connection able
//! to flush a response; IO errors latch `conn_error` and the state machine
//! races to completion discarding remaining input.

use std::fmt;
use std::io;

/// Well-known status codes used by the core.
pub mod code {
    pub const CONTINUE: u16 = 100;
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const NOT_FOUND: u16 = 404;
    pub const NOT_ACCEPTABLE: u16 = 406;
    pub const REQUEST_TOO_LARGE: u16 = 413;
    pub const URI_TOO_LARGE: u16 = 414;
    pub const RANGE_NOT_SATISFIABLE: u16 = 416;
    pub const INTERNAL_ERROR: u16 = 500;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// Reason phrase for a status code.
#[must_use]
pub fn status_text(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Large",
        416 => "Requested Range Not Satisfiable",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        _ => "Error",
    }
}

/// Classified protocol-core error.
#[derive(Debug)]
pub enum HttpError {
    /// Malformed start-line, unsupported version, bad header syntax.
    Protocol { status: u16, message: String },
    /// Request-level failure answered with a status code; the connection
    /// stays usable (no matching host or route, handler refusals).
    Status { status: u16, message: String },
    /// A configured limit was exceeded.
    Limit { status: u16, message: String },
    /// Bad `Range` or `Content-Range` header.
    Range { message: String },
    /// Missing or malformed authentication directives.
    Auth { status: u16, message: String },
    /// Socket closed or read/write failed. Connection-fatal.
    Io(io::Error),
    /// A wait deadline expired.
    Timeout,
}

impl HttpError {
    /// A protocol error with an explicit status code.
    #[must_use]
    pub fn protocol(status: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            status,
            message: message.into(),
        }
    }

    /// A limit error with an explicit status code.
    #[must_use]
    pub fn limit(status: u16, message: impl Into<String>) -> Self {
        Self::Limit {
            status,
            message: message.into(),
        }
    }

    /// A request-level error that leaves the connection usable.
    #[must_use]
    pub fn status_error(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// A range error; always answered with 416.
    #[must_use]
    pub fn range(message: impl Into<String>) -> Self {
        Self::Range {
            message: message.into(),
        }
    }

    /// An authentication error.
    #[must_use]
    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Self::Auth {
            status,
            message: message.into(),
        }
    }

    /// Human-readable message for response rendering.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Protocol { message, .. }
            | Self::Status { message, .. }
            | Self::Limit { message, .. }
            | Self::Range { message }
            | Self::Auth { message, .. } => message,
            Self::Io(_) => "Connection lost",
            Self::Timeout => "Request timeout",
        }
    }

    /// The status code this error answers with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Protocol { status, .. }
            | Self::Status { status, .. }
            | Self::Limit { status, .. }
            | Self::Auth { status, .. } => *status,
            Self::Range { .. } => code::RANGE_NOT_SATISFIABLE,
            Self::Io(_) => code::INTERNAL_ERROR,
            Self::Timeout => code::SERVICE_UNAVAILABLE,
        }
    }

    /// True if this error makes the connection unusable for further
    /// requests.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::Limit { .. } | Self::Io(_)
        )
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol { status, message } => write!(f, "protocol error {status}: {message}"),
            Self::Status { status, message } => write!(f, "request error {status}: {message}"),
            Self::Limit { status, message } => write!(f, "limit error {status}: {message}"),
            Self::Range { message } => write!(f, "range error: {message}"),
            Self::Auth { status, message } => write!(f, "auth error {status}: {message}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(HttpError::range("bad").status(), 416);
        assert_eq!(HttpError::protocol(400, "x").status(), 400);
        assert_eq!(HttpError::limit(413, "x").status(), 413);
        assert_eq!(HttpError::Timeout.status(), 503);
    }

    #[test]
    fn fatality_classes() {
        assert!(HttpError::protocol(400, "x").is_connection_fatal());
        assert!(HttpError::limit(413, "x").is_connection_fatal());
        assert!(HttpError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "p")).is_connection_fatal());
        assert!(!HttpError::range("x").is_connection_fatal());
        assert!(!HttpError::auth(401, "x").is_connection_fatal());
        assert!(!HttpError::status_error(404, "x").is_connection_fatal());
    }

    #[test]
    fn display_includes_status() {
        let e = HttpError::limit(413, "Header too big");
        assert!(e.to_string().contains("413"));
        assert!(e.to_string().contains("Header too big"));
    }

    #[test]
    fn reason_phrases() {
        assert_eq!(status_text(413), "Request Entity Too Large");
        assert_eq!(status_text(416), "Requested Range Not Satisfiable");
        assert_eq!(status_text(999), "Error");
    }
}
