//! Notary attestations over registry transcripts.
//!
//! The notary signs an [`AttestationBody`] that binds the transcript digest,
//! the ranges it reveals and hash commitments over the ranges it hides. The
//! prover keeps the commitment openings ([`PlaintextHashSecret`]) to itself.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::transcript::{ByteRange, Direction, Transcript};

/// Attestation format version.
pub const ATTESTATION_VERSION: u8 = 1;

/// Width of the random blinder in a plaintext hash commitment.
pub const BLINDER_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttestationError {
    #[error("unsupported attestation version {0}")]
    UnsupportedVersion(u8),

    #[error("attestation signature does not verify")]
    BadSignature,

    #[error("transcript digest does not match the attestation")]
    DigestMismatch,

    #[error("{direction:?} range {start}..{end} is outside the transcript")]
    RangeOutOfBounds {
        direction: Direction,
        start: usize,
        end: usize,
    },

    #[error("commitment opening does not match for {direction:?} range {start}..{end}")]
    OpeningMismatch {
        direction: Direction,
        start: usize,
        end: usize,
    },

    #[error("attestation encoding failed: {0}")]
    Encoding(String),
}

/// A range the notary saw in cleartext and vouches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedRange {
    pub direction: Direction,
    pub range: ByteRange,
}

/// Hash commitment over a hidden range: `SHA-256(plaintext || blinder)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextHash {
    pub direction: Direction,
    pub range: ByteRange,
    pub hash: [u8; 32],
}

/// Opening of a [`PlaintextHash`]. Held by the prover only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextHashSecret {
    pub direction: Direction,
    pub range: ByteRange,
    pub blinder: [u8; BLINDER_LEN],
}

impl std::fmt::Debug for PlaintextHashSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaintextHashSecret")
            .field("direction", &self.direction)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// The signed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationBody {
    pub version: u8,
    pub server_name: String,
    pub transcript_digest: [u8; 32],
    pub revealed: Vec<RevealedRange>,
    pub commitments: Vec<PlaintextHash>,
    pub notarized_at: DateTime<Utc>,
}

impl AttestationBody {
    /// Canonical bytes covered by the notary signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, AttestationError> {
        bincode::serialize(self).map_err(|e| AttestationError::Encoding(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub body: AttestationBody,
    #[serde(with = "crate::notary::serde_b64")]
    pub signature: Vec<u8>,
}

impl Attestation {
    pub fn sign(body: AttestationBody, key: &SigningKey) -> Result<Self, AttestationError> {
        let signature = key.sign(&body.signing_bytes()?);
        Ok(Self {
            body,
            signature: signature.to_bytes().to_vec(),
        })
    }

    pub fn verify_signature(&self, key: &VerifyingKey) -> Result<(), AttestationError> {
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| AttestationError::BadSignature)?;
        key.verify_strict(&self.body.signing_bytes()?, &signature)
            .map_err(|_| AttestationError::BadSignature)
    }
}

/// A transcript, the notary's attestation over it, and the prover's openings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestedTranscript {
    pub transcript: Transcript,
    pub attestation: Attestation,
    pub secrets: Vec<PlaintextHashSecret>,
}

impl AttestedTranscript {
    /// Check the attestation against `notary_key` and the carried transcript.
    ///
    /// Every range must lie inside the transcript and every secret must open
    /// a commitment over exactly the same range.
    pub fn verify(&self, notary_key: &VerifyingKey) -> Result<(), AttestationError> {
        let body = &self.attestation.body;
        if body.version != ATTESTATION_VERSION {
            return Err(AttestationError::UnsupportedVersion(body.version));
        }

        self.attestation.verify_signature(notary_key)?;

        if body.transcript_digest != self.transcript.digest() {
            return Err(AttestationError::DigestMismatch);
        }

        let ranges = body
            .revealed
            .iter()
            .map(|r| (r.direction, r.range))
            .chain(body.commitments.iter().map(|c| (c.direction, c.range)));
        for (direction, range) in ranges {
            if self.transcript.get(direction, &range).is_none() {
                return Err(AttestationError::RangeOutOfBounds {
                    direction,
                    start: range.start,
                    end: range.end,
                });
            }
        }

        for secret in &self.secrets {
            let mismatch = AttestationError::OpeningMismatch {
                direction: secret.direction,
                start: secret.range.start,
                end: secret.range.end,
            };
            let commitment = self
                .commitment(secret.direction, &secret.range)
                .ok_or_else(|| mismatch.clone())?;
            let plaintext = self
                .transcript
                .get(secret.direction, &secret.range)
                .ok_or_else(|| mismatch.clone())?;
            if plaintext_hash(plaintext, &secret.blinder) != commitment.hash {
                return Err(mismatch);
            }
        }

        Ok(())
    }

    pub fn server_name(&self) -> &str {
        &self.attestation.body.server_name
    }

    /// Commitment over exactly `range`, if any.
    pub fn commitment(&self, direction: Direction, range: &ByteRange) -> Option<&PlaintextHash> {
        self.attestation
            .body
            .commitments
            .iter()
            .find(|c| c.direction == direction && c.range == *range)
    }

    /// Opening secret for exactly `range`, if the prover holds one.
    pub fn secret(&self, direction: Direction, range: &ByteRange) -> Option<&PlaintextHashSecret> {
        self.secrets
            .iter()
            .find(|s| s.direction == direction && s.range == *range)
    }

    /// True if `range` sits inside some revealed range.
    pub fn is_revealed(&self, direction: Direction, range: &ByteRange) -> bool {
        self.attestation
            .body
            .revealed
            .iter()
            .any(|r| r.direction == direction && r.range.contains(range))
    }
}

/// `SHA-256(plaintext || blinder)`.
pub fn plaintext_hash(plaintext: &[u8], blinder: &[u8; BLINDER_LEN]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(plaintext);
    hasher.update(blinder);
    hasher.finalize().into()
}
