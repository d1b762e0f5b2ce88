//! Identity commitment scheme.
//!
//! The testator registers `SHA-256(pad(nuip, 15) || salt)` on their delegated
//! account. The heir later proves knowledge of `(nuip, salt)` opening that
//! value inside the claim circuit, so the NUIP itself never reaches the chain.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::primitives::{decode_fixed_hex, to_prefixed_hex};

/// Width of the NUIP field in the commitment pre-image and the circuit.
pub const NUIP_LEN: usize = 15;

/// Width of the commitment salt.
pub const SALT_LEN: usize = 32;

/// Errors from commitment inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitmentError {
    #[error("invalid nuip: {0}")]
    InvalidNuip(String),

    #[error("invalid salt: {0}")]
    InvalidSalt(String),
}

/// The 32-byte commitment salt, effectively the heir's credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Parse a salt from hex; the `0x` prefix is optional.
    pub fn parse(s: &str) -> Result<Self, CommitmentError> {
        decode_fixed_hex::<SALT_LEN>(s)
            .map(Self)
            .map_err(|e| CommitmentError::InvalidSalt(e.to_string()))
    }

    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

// Salts are secrets; keep them out of logs.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

/// Public, non-reversible commitment to a `(nuip, salt)` pair.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCommitment(pub [u8; 32]);

impl IdentityCommitment {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }
}

impl fmt::Debug for IdentityCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityCommitment({})", self.to_hex())
    }
}

/// Right-pad a NUIP with zero bytes to [`NUIP_LEN`].
///
/// Rejects anything that is not 1..=15 ASCII digits in canonical decimal
/// form. Longer identifiers are refused rather than truncated, and leading
/// zeros are refused, so each registry record maps to exactly one padded
/// NUIP.
pub fn pad_nuip(nuip: &str) -> Result<[u8; NUIP_LEN], CommitmentError> {
    let bytes = nuip.as_bytes();
    if bytes.is_empty() {
        return Err(CommitmentError::InvalidNuip("must not be empty".to_string()));
    }
    if bytes.len() > NUIP_LEN {
        return Err(CommitmentError::InvalidNuip(format!(
            "must be at most {} bytes, got {}",
            NUIP_LEN,
            bytes.len()
        )));
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Err(CommitmentError::InvalidNuip(
            "must contain only decimal digits".to_string(),
        ));
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return Err(CommitmentError::InvalidNuip(
            "must not have leading zeros".to_string(),
        ));
    }

    let mut padded = [0u8; NUIP_LEN];
    padded[..bytes.len()].copy_from_slice(bytes);
    Ok(padded)
}

/// Compute `SHA-256(pad(nuip, 15) || salt)`.
pub fn commit(nuip: &str, salt: &Salt) -> Result<IdentityCommitment, CommitmentError> {
    let padded = pad_nuip(nuip)?;
    Ok(commit_padded(&padded, salt.as_bytes()))
}

/// Commitment over an already padded NUIP. Shared with witness assembly.
pub(crate) fn commit_padded(padded: &[u8; NUIP_LEN], salt: &[u8; SALT_LEN]) -> IdentityCommitment {
    let mut hasher = Sha256::new();
    hasher.update(padded);
    hasher.update(salt);
    IdentityCommitment(hasher.finalize().into())
}
