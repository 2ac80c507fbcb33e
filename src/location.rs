//! Viewer location: the path plus fragment that identifies what is on screen.
//!
//! The fragment carries the open document's filename (`/#DMS.md`), mirroring
//! how a browser address bar deep-links into a single-page viewer.

use std::fmt;

/// Path and fragment of the current viewer URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path component, always starting with `/`.
    pub path: String,
    /// Raw fragment without the leading `#` (may be percent-encoded).
    pub hash: String,
}

impl Location {
    pub fn new(path: &str, hash: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_owned()
        } else {
            format!("/{path}")
        };
        Self {
            path,
            hash: hash.trim_start_matches('#').to_owned(),
        }
    }

    /// Parse `"/path#fragment"`. A missing path becomes `/`.
    pub fn parse(url: &str) -> Self {
        match url.split_once('#') {
            Some((path, hash)) => Self::new(if path.is_empty() { "/" } else { path }, hash),
            None => Self::new(if url.is_empty() { "/" } else { url }, ""),
        }
    }

    /// Decoded fragment. Falls back to the raw text when the encoding is invalid.
    pub fn fragment(&self) -> String {
        percent_decode(&self.hash).unwrap_or_else(|_| self.hash.clone())
    }

    pub fn with_hash(&self, hash: &str) -> Self {
        Self::new(&self.path, hash)
    }

    pub fn without_hash(&self) -> Self {
        Self::new(&self.path, "")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hash.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}#{}", self.path, self.hash)
        }
    }
}

/// Percent-decode a URL component byte-by-byte (RFC 3986 §2.1).
///
/// Returns `Err(())` if the encoding is malformed (truncated `%XX` sequence or
/// non-hex digit) or if the decoded byte sequence is not valid UTF-8.
pub fn percent_decode(encoded: &str) -> Result<String, ()> {
    let bytes = encoded.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(()); // truncated sequence
            }
            let hi = hex_digit(bytes[i + 1])?;
            let lo = hex_digit(bytes[i + 2])?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ())
}

fn hex_digit(b: u8) -> Result<u8, ()> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(()),
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn percent_encode_component(raw: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(raw.len());
    for &b in raw.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => {
                out.push('%');
                out.push(HEX[(b >> 4) as usize] as char);
                out.push(HEX[(b & 0x0f) as usize] as char);
            }
        }
    }
    out
}

/// Look up `name` in an `application/x-www-form-urlencoded` query string.
///
/// `+` is treated as a space. Parameters whose value fails to decode are
/// skipped.
pub fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key != name {
            return None;
        }
        percent_decode(&value.replace('+', " ")).ok()
    })
}
