//! Request-URI parsing, decoding and path normalization.

/// A parsed origin-form request URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUri {
    /// The URI as received on the wire.
    pub uri: String,
    /// Path portion, still percent-encoded.
    pub path: String,
    /// Query string without the leading `?`, if present.
    pub query: Option<String>,
    /// Extension of the last path segment, without the dot.
    pub ext: String,
}

impl ParsedUri {
    /// Parses an origin-form URI (`/path?query`).
    ///
    /// Returns `None` for an empty URI or one containing control bytes.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.bytes().any(|b| b < 0x20 || b == 0x7f) {
            return None;
        }
        let (path, query) = match raw.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (raw.to_string(), None),
        };
        let ext = extension_of(&path);
        Some(Self {
            uri: raw.to_string(),
            path,
            query,
            ext,
        })
    }
}

fn extension_of(path: &str) -> String {
    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_string(),
        _ => String::new(),
    }
}

/// Percent-decodes a URI component. Invalid escapes pass through verbatim.
#[must_use]
pub fn decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| hex_val(*b)),
                bytes.get(i + 2).and_then(|b| hex_val(*b)),
            ) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Normalizes a decoded path: resolves `.` and `..` segments and collapses
/// duplicate separators. `..` never climbs above the root.
#[must_use]
pub fn normalize(path: &str) -> String {
    let rooted = path.starts_with('/');
    let trailing = path.len() > 1 && path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut out = String::new();
    if rooted {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
