//! Byte-range grammar for `Range` and `Content-Range` headers.
//!
//! A range is a `[start, end)` interval. Either bound may be `-1`:
//!
//! - `start = -1` — suffix range ("from the end"), must be the final range
//! - `end = -1` — open range ("to the end")
//!
//! but never both. `bytes=-N` parses to `{start: -1, end: N}`, `bytes=N-`
//! to `{start: N, end: -1}`, and `bytes=N-M` to `{start: N, end: M + 1}`
//! (the exclusive end makes the length arithmetic direct). Any grammar or
//! validation failure answers `416 Range Not Satisfiable`.

use crate::error::HttpError;

/// One byte range of a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte position, or `-1` for a suffix range.
    pub start: i64,
    /// One past the last byte position, or `-1` for an open range.
    pub end: i64,
    /// `end - start` when both bounds are set, else `-1`.
    pub len: i64,
}

impl ByteRange {
    /// Creates a range, deriving `len` from the bounds.
    #[must_use]
    pub fn new(start: i64, end: i64) -> Self {
        let len = if start >= 0 && end >= 0 { end - start } else { -1 };
        Self { start, end, len }
    }
}

/// Parses a `Range` header value (`bytes=n1-n2,n3-n4,...`).
///
/// Validation rules:
///
/// - a set `end` must be strictly greater than `start`
/// - at most one of `start`/`end` may be `-1`
/// - a suffix range (`start = -1`) must be the final range
/// - successive ranges must not overlap (`end <= next.start`)
///
/// # Errors
///
/// Returns a range error (416) on any grammar or validation failure.
pub fn parse_range_header(value: &str) -> Result<Vec<ByteRange>, HttpError> {
    let (unit, set) = value
        .split_once('=')
        .ok_or_else(|| HttpError::range("missing range unit"))?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(HttpError::range(format!("bad range unit {}", unit.trim())));
    }

    let mut ranges = Vec::new();
    for piece in set.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            return Err(HttpError::range("empty range"));
        }
        ranges.push(parse_one_range(piece)?);
    }
    validate_ranges(&ranges)?;
    Ok(ranges)
}

fn parse_one_range(piece: &str) -> Result<ByteRange, HttpError> {
    if let Some(suffix) = piece.strip_prefix('-') {
        let end = parse_bound(suffix)?;
        return Ok(ByteRange::new(-1, end));
    }
    let (start, end) = piece
        .split_once('-')
        .ok_or_else(|| HttpError::range("missing '-' separator"))?;
    let start = parse_bound(start)?;
    let end = if end.trim().is_empty() {
        -1
    } else {
        parse_bound(end)? + 1
    };
    Ok(ByteRange::new(start, end))
}

fn parse_bound(s: &str) -> Result<i64, HttpError> {
    s.trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n >= 0)
        .ok_or_else(|| HttpError::range(format!("bad range bound {s}")))
}

fn validate_ranges(ranges: &[ByteRange]) -> Result<(), HttpError> {
    for (i, range) in ranges.iter().enumerate() {
        if range.end != -1 && range.start >= range.end {
            return Err(HttpError::range("descending range"));
        }
        if range.start < 0 && range.end < 0 {
            return Err(HttpError::range("unbounded range"));
        }
        let next = ranges.get(i + 1);
        if range.start < 0 && next.is_some() {
            // A suffix range reaches the end, nothing may follow it.
            return Err(HttpError::range("suffix range not last"));
        }
        if let Some(next) = next {
            if next.start >= 0 && range.end > next.start {
                return Err(HttpError::range("overlapping ranges"));
            }
        }
    }
    Ok(())
}

/// Parses a `Content-Range` request header (`bytes n1-n2/size`) describing
/// the span of an uploaded body portion.
///
/// # Errors
///
/// Returns a range error (416) if any of the three numbers is missing or
/// the span is not ascending.
pub fn parse_content_range(value: &str) -> Result<ByteRange, HttpError> {
    let bytes = value.as_bytes();
    let digits_at = |mut i: usize| -> Option<(i64, usize)> {
        let from = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == from {
            return None;
        }
        value[from..i].parse::<i64>().ok().map(|n| (n, i))
    };

    let first_digit = bytes
        .iter()
        .position(u8::is_ascii_digit)
        .ok_or_else(|| HttpError::range("bad content range"))?;
    let parsed = (|| {
        let (start, after_start) = digits_at(first_digit)?;
        let dash = after_start + bytes[after_start..].iter().position(|b| *b == b'-')?;
        let (end, after_end) = digits_at(dash + 1)?;
        let slash = after_end + bytes[after_end..].iter().position(|b| *b == b'/')?;
        let (size, _) = digits_at(slash + 1)?;
        Some((start, end, size))
    })();

    match parsed {
        Some((start, end, _size)) if end > start => Ok(ByteRange::new(start, end + 1)),
        _ => Err(HttpError::range("bad content range")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Range header grammar
    // =========================================================================

    #[test]
    fn bounded_range() {
        let ranges = parse_range_header("bytes=0-49").unwrap();
        assert_eq!(ranges, [ByteRange { start: 0, end: 50, len: 50 }]);
    }

    #[test]
    fn open_range() {
        let ranges = parse_range_header("bytes=200-").unwrap();
        assert_eq!(ranges, [ByteRange { start: 200, end: -1, len: -1 }]);
    }

    #[test]
    fn suffix_range() {
        let ranges = parse_range_header("bytes=-50").unwrap();
        assert_eq!(ranges, [ByteRange { start: -1, end: 50, len: -1 }]);
    }

    #[test]
    fn multiple_ranges_in_order() {
        let ranges = parse_range_header("bytes=0-49,200-").unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], ByteRange { start: 0, end: 50, len: 50 });
        assert_eq!(ranges[1], ByteRange { start: 200, end: -1, len: -1 });
    }

    #[test]
    fn descending_range_rejected() {
        assert!(parse_range_header("bytes=50-10").is_err());
    }

    #[test]
    fn overlapping_ranges_rejected() {
        assert!(parse_range_header("bytes=0-100,50-200").is_err());
    }

    #[test]
    fn adjacent_ranges_allowed() {
        // end is exclusive, so 0-49 followed by 50- touches without overlap
        assert!(parse_range_header("bytes=0-49,50-99").is_ok());
    }

    #[test]
    fn suffix_must_be_last() {
        assert!(parse_range_header("bytes=-10,20-30").is_err());
        assert!(parse_range_header("bytes=20-30,-10").is_ok());
    }

    #[test]
    fn bad_grammar_rejected() {
        assert!(parse_range_header("bytes 0-49").is_err());
        assert!(parse_range_header("items=0-49").is_err());
        assert!(parse_range_header("bytes=abc-10").is_err());
        assert!(parse_range_header("bytes=10-xyz").is_err());
        assert!(parse_range_header("bytes=,").is_err());
        assert!(parse_range_header("bytes=-").is_err());
    }

    #[test]
    fn whitespace_tolerated() {
        let ranges = parse_range_header("bytes= 0-49 , 200- ").unwrap();
        assert_eq!(ranges.len(), 2);
    }

    // =========================================================================
    // Content-Range request header
    // =========================================================================

    #[test]
    fn content_range_parses() {
        let range = parse_content_range("bytes 0-99/500").unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 100);
        assert_eq!(range.len, 100);
    }

    #[test]
    fn content_range_rejects_descending() {
        assert!(parse_content_range("bytes 99-0/500").is_err());
        assert!(parse_content_range("bytes 5-5/500").is_err());
    }

    #[test]
    fn content_range_rejects_missing_parts() {
        assert!(parse_content_range("bytes */500").is_err());
        assert!(parse_content_range("bytes 0-99").is_err());
        assert!(parse_content_range("garbage").is_err());
    }
}
