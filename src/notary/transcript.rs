//! The bytes exchanged with the registry, rendered as HTTP/1.1 messages.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DIGEST_DOMAIN: &[u8] = b"proofheir/transcript/v1";

/// Which side of the exchange a range refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

/// Half-open byte range `[start, end)` into one direction of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &ByteRange) -> bool {
        self.start <= other.start && other.end <= self.end && other.start <= other.end
    }

    /// Shift the range by `offset` bytes.
    pub fn offset(&self, offset: usize) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }
}

/// Errors from interpreting transcript bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("malformed HTTP response: {0}")]
    MalformedResponse(String),
}

/// Full transcript of one registry exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(with = "crate::notary::serde_b64")]
    sent: Vec<u8>,
    #[serde(with = "crate::notary::serde_b64")]
    received: Vec<u8>,
}

impl Transcript {
    pub fn new(sent: Vec<u8>, received: Vec<u8>) -> Self {
        Self { sent, received }
    }

    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn received(&self) -> &[u8] {
        &self.received
    }

    pub fn data(&self, direction: Direction) -> &[u8] {
        match direction {
            Direction::Sent => &self.sent,
            Direction::Received => &self.received,
        }
    }

    /// Bytes of `range` in `direction`, if in bounds.
    pub fn get(&self, direction: Direction, range: &ByteRange) -> Option<&[u8]> {
        if range.start > range.end {
            return None;
        }
        self.data(direction).get(range.start..range.end)
    }

    /// Domain-separated, length-prefixed SHA-256 over both directions.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(DIGEST_DOMAIN);
        hasher.update((self.sent.len() as u64).to_be_bytes());
        hasher.update(&self.sent);
        hasher.update((self.received.len() as u64).to_be_bytes());
        hasher.update(&self.received);
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("sent_len", &self.sent.len())
            .field("received_len", &self.received.len())
            .finish()
    }
}

/// Location of the interesting parts of a received HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseView {
    pub status: u16,
    /// Body range within the received transcript.
    pub body: ByteRange,
}

impl ResponseView {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Render an HTTP/1.1 response the way the notary records it.
pub fn render_response(status: u16, reason: &str, content_type: Option<&str>, body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason);
    if let Some(content_type) = content_type {
        head.push_str(&format!("content-type: {}\r\n", content_type));
    }
    head.push_str(&format!("content-length: {}\r\n\r\n", body.len()));

    let mut out = head.into_bytes();
    out.extend_from_slice(body);
    out
}

/// Split a received transcript into status and body.
pub fn parse_response(received: &[u8]) -> Result<ResponseView, TranscriptError> {
    let header_end = find(received, b"\r\n\r\n")
        .ok_or_else(|| TranscriptError::MalformedResponse("no header terminator".to_string()))?;
    let line_end = find(received, b"\r\n").unwrap_or(header_end);

    let status_line = std::str::from_utf8(&received[..line_end])
        .map_err(|_| TranscriptError::MalformedResponse("status line is not UTF-8".to_string()))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(TranscriptError::MalformedResponse(format!(
            "unexpected status line: {}",
            status_line
        )));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| TranscriptError::MalformedResponse(format!("bad status code in: {}", status_line)))?;

    Ok(ResponseView {
        status,
        body: ByteRange::new(header_end + 4, received.len()),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_parse_response() {
        let body = br#"{"nuip":1,"vigencia":"Vigente (Vivo)"}"#;
        let raw = render_response(200, "OK", Some("application/json"), body);
        let view = parse_response(&raw).unwrap();

        assert_eq!(view.status, 200);
        assert!(view.is_success());
        assert_eq!(&raw[view.body.start..view.body.end], body);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_response(b"not http at all").is_err());
        assert!(parse_response(b"SMTP 220 hello\r\n\r\n").is_err());
        assert!(parse_response(b"HTTP/1.1 abc OK\r\n\r\n").is_err());
    }

    #[test]
    fn test_digest_binds_direction_boundary() {
        // Moving a byte across the sent/received boundary must change the digest.
        let a = Transcript::new(b"ab".to_vec(), b"c".to_vec());
        let b = Transcript::new(b"a".to_vec(), b"bc".to_vec());
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest(), a.clone().digest());
    }

    #[test]
    fn test_get_bounds() {
        let t = Transcript::new(b"hello".to_vec(), Vec::new());
        assert_eq!(t.get(Direction::Sent, &ByteRange::new(1, 3)), Some(&b"el"[..]));
        assert_eq!(t.get(Direction::Sent, &ByteRange::new(3, 9)), None);
        assert_eq!(t.get(Direction::Received, &ByteRange::new(0, 1)), None);
    }

    #[test]
    fn test_range_contains() {
        let outer = ByteRange::new(10, 20);
        assert!(outer.contains(&ByteRange::new(10, 20)));
        assert!(outer.contains(&ByteRange::new(12, 15)));
        assert!(!outer.contains(&ByteRange::new(9, 15)));
        assert!(!outer.contains(&ByteRange::new(15, 21)));
    }
}
