//! Chunked transfer-encoding frame scanning.
//!
//! A chunk header is framed as `CRLF <hex-size> [; ext] CRLF`. The leading
//! CRLF is the terminator of the previous chunk's data (or the final CRLF
//! of the header block, which the parser deliberately leaves unconsumed for
//! chunked requests), so a single scan sees one self-contained delimiter.
//! Size zero terminates the body; its trailing CRLF is consumed when
//! present but its absence is tolerated.

use crate::error::{code, HttpError};
use memchr::memchr;

/// Longest permitted chunk-size line before the scan gives up.
const MAX_CHUNK_HEADER: usize = 80;

/// Chunk decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkState {
    /// Expecting a chunk header next.
    #[default]
    Start,
    /// Consuming chunk payload bytes.
    Data,
    /// Saw the zero-length final chunk.
    Eof,
}

/// A scanned chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Bytes the header occupies at the front of the buffer, including the
    /// final CRLF after a zero-size chunk when present.
    pub header_len: usize,
    /// Declared payload size.
    pub size: u64,
}

/// Scans a chunk header at the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed.
///
/// # Errors
///
/// Returns a 400 protocol error when the leading CRLF is missing, the size
/// is not hex, or the size line exceeds 80 bytes without terminating.
pub fn scan_chunk_header(buf: &[u8]) -> Result<Option<ChunkHeader>, HttpError> {
    if buf.len() < 3 {
        return Ok(None);
    }
    if buf[0] != b'\r' || buf[1] != b'\n' {
        return Err(bad_chunk());
    }
    let lf = match memchr(b'\n', &buf[2..]) {
        Some(pos) => 2 + pos,
        None => {
            if buf.len() > MAX_CHUNK_HEADER {
                return Err(bad_chunk());
            }
            return Ok(None);
        }
    };
    if lf > MAX_CHUNK_HEADER {
        return Err(bad_chunk());
    }
    if buf[lf - 1] != b'\r' {
        return Err(bad_chunk());
    }

    let size = parse_hex(&buf[2..lf - 1])?;
    let mut header_len = lf + 1;
    if size == 0 && buf.len() >= header_len + 2 && &buf[header_len..header_len + 2] == b"\r\n" {
        // Lenient: the final CRLF after the last chunk may be absent.
        header_len += 2;
    }
    Ok(Some(ChunkHeader { header_len, size }))
}

fn parse_hex(line: &[u8]) -> Result<u64, HttpError> {
    let mut value: u64 = 0;
    let mut digits = 0;
    for &b in line {
        let d = match b {
            b'0'..=b'9' => u64::from(b - b'0'),
            b'a'..=b'f' => u64::from(b - b'a') + 10,
            b'A'..=b'F' => u64::from(b - b'A') + 10,
            // Chunk extensions and trailing whitespace end the digits.
            _ => break,
        };
        value = value
            .checked_mul(16)
            .and_then(|v| v.checked_add(d))
            .ok_or_else(bad_chunk)?;
        digits += 1;
    }
    if digits == 0 {
        return Err(bad_chunk());
    }
    Ok(value)
}

fn bad_chunk() -> HttpError {
    HttpError::protocol(code::BAD_REQUEST, "Bad chunk specification")
}
