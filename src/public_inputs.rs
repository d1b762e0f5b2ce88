//! Public-input layout of the claim circuit.
//!
//! Version 1 exposes 116 field elements, each carrying one byte:
//!
//! | index   | field               |
//! |---------|---------------------|
//! | 0..20   | `recipient`         |
//! | 20..52  | `server_hash`       |
//! | 52..84  | `id_commitment`     |
//! | 84..116 | `status_commitment` |
//!
//! The verifier contract consumes exactly this layout, so any change bumps
//! [`PUBLIC_INPUT_LAYOUT_VERSION`].

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use sha2::{Digest, Sha256};

use crate::commitment::IdentityCommitment;
use crate::primitives::Address;

pub const PUBLIC_INPUT_LAYOUT_VERSION: u8 = 1;
pub const PUBLIC_INPUT_COUNT: usize = 116;

/// Server names are space-padded to this width before hashing.
pub const SERVER_NAME_LEN: usize = 40;

pub const RECIPIENT: std::ops::Range<usize> = 0..20;
pub const SERVER_HASH: std::ops::Range<usize> = 20..52;
pub const ID_COMMITMENT: std::ops::Range<usize> = 52..84;
pub const STATUS_COMMITMENT: std::ops::Range<usize> = 84..116;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublicInputError {
    #[error("expected {expected} public inputs, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("public input {index} is not a byte")]
    NotAByte { index: usize },

    #[error("server name is {0} bytes, at most 40 fit the circuit")]
    ServerNameTooLong(usize),
}

/// The values a claim proof is public about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    pub recipient: Address,
    pub server_hash: [u8; 32],
    pub id_commitment: IdentityCommitment,
    pub status_commitment: [u8; 32],
}

impl PublicInputs {
    pub fn to_bytes(&self) -> [u8; PUBLIC_INPUT_COUNT] {
        let mut out = [0u8; PUBLIC_INPUT_COUNT];
        out[RECIPIENT].copy_from_slice(self.recipient.as_bytes());
        out[SERVER_HASH].copy_from_slice(&self.server_hash);
        out[ID_COMMITMENT].copy_from_slice(self.id_commitment.as_bytes());
        out[STATUS_COMMITMENT].copy_from_slice(&self.status_commitment);
        out
    }

    pub fn from_bytes(bytes: &[u8; PUBLIC_INPUT_COUNT]) -> Self {
        let mut recipient = [0u8; 20];
        let mut server_hash = [0u8; 32];
        let mut id_commitment = [0u8; 32];
        let mut status_commitment = [0u8; 32];
        recipient.copy_from_slice(&bytes[RECIPIENT]);
        server_hash.copy_from_slice(&bytes[SERVER_HASH]);
        id_commitment.copy_from_slice(&bytes[ID_COMMITMENT]);
        status_commitment.copy_from_slice(&bytes[STATUS_COMMITMENT]);

        Self {
            recipient: Address(recipient),
            server_hash,
            id_commitment: IdentityCommitment(id_commitment),
            status_commitment,
        }
    }

    pub fn to_field_elements(&self) -> Vec<Fr> {
        self.to_bytes().iter().map(|b| Fr::from(*b as u64)).collect()
    }

    /// Rebuild from field elements, rejecting any element outside `0..=255`.
    pub fn from_field_elements(elements: &[Fr]) -> Result<Self, PublicInputError> {
        if elements.len() != PUBLIC_INPUT_COUNT {
            return Err(PublicInputError::WrongCount {
                expected: PUBLIC_INPUT_COUNT,
                actual: elements.len(),
            });
        }

        let mut bytes = [0u8; PUBLIC_INPUT_COUNT];
        for (index, element) in elements.iter().enumerate() {
            bytes[index] = field_to_byte(element).ok_or(PublicInputError::NotAByte { index })?;
        }
        Ok(Self::from_bytes(&bytes))
    }
}

fn field_to_byte(element: &Fr) -> Option<u8> {
    let repr = element.into_bigint().to_bytes_le();
    if repr[1..].iter().any(|b| *b != 0) {
        return None;
    }
    repr.first().copied()
}

/// Right-pad a server name with spaces to [`SERVER_NAME_LEN`].
pub fn pad_server_name(server_name: &str) -> Result<[u8; SERVER_NAME_LEN], PublicInputError> {
    let bytes = server_name.as_bytes();
    if bytes.len() > SERVER_NAME_LEN {
        return Err(PublicInputError::ServerNameTooLong(bytes.len()));
    }
    let mut padded = [b' '; SERVER_NAME_LEN];
    padded[..bytes.len()].copy_from_slice(bytes);
    Ok(padded)
}

/// `SHA-256` of the space-padded server name.
pub fn server_hash(server_name: &str) -> Result<[u8; 32], PublicInputError> {
    Ok(Sha256::digest(pad_server_name(server_name)?).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PublicInputs {
        PublicInputs {
            recipient: Address([0xab; 20]),
            server_hash: server_hash("registry.test").unwrap(),
            id_commitment: IdentityCommitment([0x16; 32]),
            status_commitment: [0xff; 32],
        }
    }

    #[test]
    fn test_server_hash_known_value() {
        assert_eq!(
            hex::encode(server_hash("registry.test").unwrap()),
            "bca0d72ed8e530068c782e47e760e93bfaedb605fb5163fa98c067f53213114f"
        );
    }

    #[test]
    fn test_long_server_name_rejected() {
        let name = "a".repeat(41);
        assert_eq!(server_hash(&name), Err(PublicInputError::ServerNameTooLong(41)));
        assert!(server_hash(&"a".repeat(40)).is_ok());
    }

    #[test]
    fn test_layout_positions() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..20], &[0xab; 20]);
        assert_eq!(&bytes[52..84], &[0x16; 32]);
        assert_eq!(&bytes[84..116], &[0xff; 32]);

        let elements = sample().to_field_elements();
        assert_eq!(elements.len(), PUBLIC_INPUT_COUNT);
        assert_eq!(elements[0], Fr::from(0xabu64));
        assert_eq!(elements[115], Fr::from(0xffu64));
    }

    #[test]
    fn test_from_field_elements_rejects_wide_values() {
        let mut elements = sample().to_field_elements();
        elements[30] = Fr::from(256u64);
        assert_eq!(
            PublicInputs::from_field_elements(&elements),
            Err(PublicInputError::NotAByte { index: 30 })
        );

        elements.pop();
        assert!(matches!(
            PublicInputs::from_field_elements(&elements),
            Err(PublicInputError::WrongCount { .. })
        ));
    }

    #[test]
    fn test_field_elements_restore() {
        let restored = PublicInputs::from_field_elements(&sample().to_field_elements()).unwrap();
        assert_eq!(restored, sample());
    }
}
