//! Byte-span scanner for the top-level fields of a JSON object.
//!
//! Selective disclosure works on byte ranges of the transcript, so we need to
//! know *where* a value sits, not just what it is. The body is validated with
//! `serde_json` first; the scanner then walks the same bytes to record spans.

use super::transcript::ByteRange;

/// Coarse JSON type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    String,
    Number,
    Other,
}

/// One top-level `"key": value` pair with the value's byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonField {
    pub key: String,
    pub kind: JsonKind,
    /// Span of the raw value, including quotes for strings.
    pub value: ByteRange,
}

impl JsonField {
    /// Span of the value's content: strings without their quotes.
    pub fn content(&self) -> ByteRange {
        match self.kind {
            JsonKind::String if self.value.len() >= 2 => {
                ByteRange::new(self.value.start + 1, self.value.end - 1)
            }
            _ => self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonShapeError {
    #[error("body is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("unexpected byte at offset {0}")]
    Unexpected(usize),

    #[error("truncated JSON")]
    Truncated,
}

/// Scan the top-level fields of a JSON object. Spans are relative to `body`.
pub fn top_level_fields(body: &[u8]) -> Result<Vec<JsonField>, JsonShapeError> {
    serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(body)
        .map_err(|e| JsonShapeError::NotAnObject(e.to_string()))?;

    let mut scanner = Scanner { bytes: body, pos: 0 };
    let mut fields = Vec::new();

    scanner.skip_ws();
    scanner.expect(b'{')?;
    scanner.skip_ws();
    if scanner.peek()? == b'}' {
        return Ok(fields);
    }

    loop {
        scanner.skip_ws();
        let key_span = scanner.string()?;
        let key: String = serde_json::from_slice(&body[key_span.start..key_span.end])
            .map_err(|e| JsonShapeError::NotAnObject(e.to_string()))?;

        scanner.skip_ws();
        scanner.expect(b':')?;
        scanner.skip_ws();

        let kind = match scanner.peek()? {
            b'"' => JsonKind::String,
            b'-' | b'0'..=b'9' => JsonKind::Number,
            _ => JsonKind::Other,
        };
        let start = scanner.pos;
        scanner.value()?;
        fields.push(JsonField {
            key,
            kind,
            value: ByteRange::new(start, scanner.pos),
        });

        scanner.skip_ws();
        match scanner.next()? {
            b',' => continue,
            b'}' => break,
            _ => return Err(JsonShapeError::Unexpected(scanner.pos - 1)),
        }
    }

    Ok(fields)
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> Result<u8, JsonShapeError> {
        self.bytes.get(self.pos).copied().ok_or(JsonShapeError::Truncated)
    }

    fn next(&mut self) -> Result<u8, JsonShapeError> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, byte: u8) -> Result<(), JsonShapeError> {
        if self.next()? == byte {
            Ok(())
        } else {
            Err(JsonShapeError::Unexpected(self.pos - 1))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.bytes.get(self.pos), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Consume a string literal, returning its span including quotes.
    fn string(&mut self) -> Result<ByteRange, JsonShapeError> {
        let start = self.pos;
        self.expect(b'"')?;
        loop {
            match self.next()? {
                b'\\' => {
                    self.next()?;
                }
                b'"' => return Ok(ByteRange::new(start, self.pos)),
                _ => {}
            }
        }
    }

    fn value(&mut self) -> Result<(), JsonShapeError> {
        match self.peek()? {
            b'"' => self.string().map(|_| ()),
            b'{' | b'[' => self.nested(),
            _ => {
                while let Some(b) = self.bytes.get(self.pos) {
                    if matches!(b, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                        break;
                    }
                    self.pos += 1;
                }
                Ok(())
            }
        }
    }

    fn nested(&mut self) -> Result<(), JsonShapeError> {
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                b'"' => {
                    self.string()?;
                    continue;
                }
                b'{' | b'[' => depth += 1,
                b'}' | b']' => depth -= 1,
                _ => {}
            }
            self.pos += 1;
            if depth == 0 {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice<'a>(body: &'a [u8], range: &ByteRange) -> &'a [u8] {
        &body[range.start..range.end]
    }

    #[test]
    fn test_registry_shape() {
        let body = br#"{"nuip": 123456789, "vigencia": "No Vigente (Fallecido)"}"#;
        let fields = top_level_fields(body).unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].key, "nuip");
        assert_eq!(fields[0].kind, JsonKind::Number);
        assert_eq!(slice(body, &fields[0].content()), b"123456789");

        assert_eq!(fields[1].key, "vigencia");
        assert_eq!(fields[1].kind, JsonKind::String);
        assert_eq!(slice(body, &fields[1].value), br#""No Vigente (Fallecido)""#);
        assert_eq!(slice(body, &fields[1].content()), b"No Vigente (Fallecido)");
    }

    #[test]
    fn test_nested_values_and_escapes_skipped() {
        let body = br#"{"meta":{"a":[1,"}"]},"note":"say \"hi\"","ok":true}"#;
        let fields = top_level_fields(body).unwrap();

        let keys: Vec<_> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["meta", "note", "ok"]);
        assert_eq!(slice(body, &fields[0].value), br#"{"a":[1,"}"]}"#);
        assert_eq!(slice(body, &fields[1].content()), br#"say \"hi\""#);
        assert_eq!(fields[2].kind, JsonKind::Other);
    }

    #[test]
    fn test_empty_object() {
        assert!(top_level_fields(b" { } ").unwrap().is_empty());
    }

    #[test]
    fn test_non_objects_rejected() {
        assert!(matches!(top_level_fields(b"[1,2]"), Err(JsonShapeError::NotAnObject(_))));
        assert!(matches!(top_level_fields(b"{\"a\":"), Err(JsonShapeError::NotAnObject(_))));
        assert!(matches!(top_level_fields(b"<html>"), Err(JsonShapeError::NotAnObject(_))));
    }
}
