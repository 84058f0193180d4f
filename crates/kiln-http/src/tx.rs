//! Transmit context.
//!
//! The outbound response pipeline lives above this crate; the core keeps
//! only the per-request transmit state it has to know about: the response
//! status, headers a stage wants carried (auth challenges), the extension
//! copied from the parsed URI, and the buffered output bytes the connection
//! driver flushes.

use crate::headers::HeaderMap;
use crate::method::Method;

/// Per-request transmit state.
#[derive(Debug, Default)]
pub struct Tx {
    /// Response status set by the handler or error path.
    pub status: u16,
    /// Response headers staged by handlers.
    pub headers: HeaderMap,
    /// Extension of the request URI, copied by `set_uri`.
    pub extension: String,
    /// Client role: the method of the request this response answers.
    pub method: Option<Method>,
    /// Name of the handler serving the request, for diagnostics.
    pub handler: Option<String>,
    /// Buffered output awaiting the connection driver.
    pub output: Vec<u8>,
    /// Set by a pipeline stage whose write sink is full; the connection
    /// suspends until the driver reports the socket writable again.
    pub write_blocked: bool,
}

impl Tx {
    /// Creates an empty transmit context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the buffered output, leaving the buffer empty.
    #[must_use]
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}
