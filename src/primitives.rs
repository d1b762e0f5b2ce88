//! Fixed-width hex values shared by the request, commitment and chain layers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors from decoding fixed-width hex strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Malformed(String),

    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Strip an optional `0x` / `0X` prefix.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode a hex string (prefix optional) into exactly `N` bytes.
pub fn decode_fixed_hex<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let bytes = hex::decode(strip_hex_prefix(s.trim()))
        .map_err(|e| HexError::Malformed(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| HexError::WrongLength { expected: N, actual })
}

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// A 20-byte EVM account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn parse(s: &str) -> Result<Self, HexError> {
        decode_fixed_hex::<20>(s).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_accepts_both_prefix_forms() {
        let with = Address::parse("0xabababababababababababababababababababab").unwrap();
        let upper = Address::parse("0Xabababababababababababababababababababab").unwrap();
        let without = Address::parse("abababababababababababababababababababab").unwrap();
        assert_eq!(with, without);
        assert_eq!(with, upper);
        assert_eq!(with.to_string(), "0xabababababababababababababababababababab");
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert_eq!(
            Address::parse("0xabab"),
            Err(HexError::WrongLength { expected: 20, actual: 2 })
        );
    }

    #[test]
    fn test_address_rejects_non_hex() {
        assert!(matches!(
            Address::parse("0xzzabababababababababababababababababab"),
            Err(HexError::Malformed(_))
        ));
    }
}
