//! Configurable request-processing limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum header block size (64KB).
pub const DEFAULT_HEADER_SIZE: usize = 64 * 1024;
/// Default maximum number of header lines.
pub const DEFAULT_HEADER_COUNT: usize = 100;
/// Default maximum URI length (8KB).
pub const DEFAULT_URI_SIZE: usize = 8 * 1024;
/// Default maximum request body size (4MB).
pub const DEFAULT_RECEIVE_BODY_SIZE: u64 = 4 * 1024 * 1024;
/// Default output chunk size (8KB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
/// Default receive-queue capacity before backpressure (256KB).
pub const DEFAULT_RECEIVE_QUEUE_MAX: usize = 256 * 1024;
/// Default keep-alive request budget per connection.
pub const DEFAULT_MAX_KEEP_ALIVE: i32 = 100;
/// Default housekeeping timer period.
pub const DEFAULT_TIMER_PERIOD: Duration = Duration::from_secs(1);
/// Default connection inactivity timeout.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Limits applied while parsing and running a request.
///
/// An endpoint inherits its limits from the first host's default route; a
/// connection snapshots them at accept time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpLimits {
    /// Maximum size of the request/response header block in bytes.
    pub header_size: usize,
    /// Maximum number of header lines.
    pub header_count: usize,
    /// Maximum URI length in bytes.
    pub uri_size: usize,
    /// Maximum received body size in bytes.
    pub receive_body_size: u64,
    /// Preferred output chunk size in bytes.
    pub chunk_size: usize,
    /// Receive-queue byte budget; the machine stalls past this.
    pub receive_queue_max: usize,
    /// Concurrent requests allowed per endpoint. 0 means unlimited.
    pub max_requests: usize,
    /// Requests served per connection before forcing a close.
    pub max_keep_alive: i32,
    /// Period of the housekeeping tick.
    pub timer_period: Duration,
    /// Idle time after which housekeeping reaps a connection.
    pub inactivity_timeout: Duration,
}

impl Default for HttpLimits {
    fn default() -> Self {
        Self {
            header_size: DEFAULT_HEADER_SIZE,
            header_count: DEFAULT_HEADER_COUNT,
            uri_size: DEFAULT_URI_SIZE,
            receive_body_size: DEFAULT_RECEIVE_BODY_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            receive_queue_max: DEFAULT_RECEIVE_QUEUE_MAX,
            max_requests: 0,
            max_keep_alive: DEFAULT_MAX_KEEP_ALIVE,
            timer_period: DEFAULT_TIMER_PERIOD,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
        }
    }
}

impl HttpLimits {
    /// Creates limits with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum header block size.
    #[must_use]
    pub fn with_header_size(mut self, bytes: usize) -> Self {
        self.header_size = bytes;
        self
    }

    /// Sets the maximum header line count.
    #[must_use]
    pub fn with_header_count(mut self, count: usize) -> Self {
        self.header_count = count;
        self
    }

    /// Sets the maximum URI length.
    #[must_use]
    pub fn with_uri_size(mut self, bytes: usize) -> Self {
        self.uri_size = bytes;
        self
    }

    /// Sets the maximum received body size.
    #[must_use]
    pub fn with_receive_body_size(mut self, bytes: u64) -> Self {
        self.receive_body_size = bytes;
        self
    }

    /// Sets the preferred output chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Sets the receive-queue byte budget.
    #[must_use]
    pub fn with_receive_queue_max(mut self, bytes: usize) -> Self {
        self.receive_queue_max = bytes;
        self
    }

    /// Sets the concurrent request limit per endpoint.
    #[must_use]
    pub fn with_max_requests(mut self, count: usize) -> Self {
        self.max_requests = count;
        self
    }

    /// Sets the per-connection request budget.
    #[must_use]
    pub fn with_max_keep_alive(mut self, count: i32) -> Self {
        self.max_keep_alive = count;
        self
    }

    /// Sets the housekeeping timer period.
    #[must_use]
    pub fn with_timer_period(mut self, period: Duration) -> Self {
        self.timer_period = period;
        self
    }

    /// Sets the connection inactivity timeout.
    #[must_use]
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let limits = HttpLimits::new()
            .with_header_size(1024)
            .with_header_count(8)
            .with_uri_size(256)
            .with_receive_body_size(512)
            .with_max_requests(10);
        assert_eq!(limits.header_size, 1024);
        assert_eq!(limits.header_count, 8);
        assert_eq!(limits.uri_size, 256);
        assert_eq!(limits.receive_body_size, 512);
        assert_eq!(limits.max_requests, 10);
    }

    #[test]
    fn defaults() {
        let limits = HttpLimits::default();
        assert_eq!(limits.header_size, DEFAULT_HEADER_SIZE);
        assert_eq!(limits.max_requests, 0);
        assert_eq!(limits.timer_period, DEFAULT_TIMER_PERIOD);
    }

}
