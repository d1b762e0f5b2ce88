//! Groth16 proof verification for inheritance claims.
//!
//! Mirrors the check the on-chain verifier performs over the same 116
//! public inputs.

use ark_bn254::Bn254;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_serialize::CanonicalSerialize;
use ark_snark::SNARK;
use std::path::Path;

use crate::chain::{decode_proof, decode_public_inputs, ChainEncodingError, ChainProof};
use crate::prover::{load_verifying_key, ProofBundle, ProverError};
use crate::public_inputs::{PublicInputs, PUBLIC_INPUT_COUNT, PUBLIC_INPUT_LAYOUT_VERSION};

/// Result type for verifier operations.
pub type VerifierResult<T> = Result<T, VerifierError>;

/// Errors that can occur during verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid proof format: {0}")]
    InvalidProof(#[from] ChainEncodingError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Key error: {0}")]
    Key(#[from] ProverError),

    #[error("Status commitment mismatch: proof is for a different registry answer")]
    StatusCommitmentMismatch,
}

/// Verifier for claim proofs.
pub struct ClaimVerifier {
    /// Prepared verifying key for fast verification.
    prepared_vk: PreparedVerifyingKey<Bn254>,
    /// Original verifying key (for serialization).
    verifying_key: VerifyingKey<Bn254>,
}

impl ClaimVerifier {
    pub fn new(vk: VerifyingKey<Bn254>) -> VerifierResult<Self> {
        let prepared_vk = Groth16::<Bn254>::process_vk(&vk)
            .map_err(|e| VerifierError::VerificationFailed(e.to_string()))?;
        Ok(Self {
            prepared_vk,
            verifying_key: vk,
        })
    }

    /// Verify a bundle against its own public inputs.
    pub fn verify(&self, bundle: &ProofBundle) -> VerifierResult<bool> {
        self.verify_inputs(&bundle.proof, &bundle.public_inputs)
    }

    pub fn verify_inputs(&self, proof: &Proof<Bn254>, inputs: &PublicInputs) -> VerifierResult<bool> {
        Groth16::<Bn254>::verify_with_processed_vk(&self.prepared_vk, &inputs.to_field_elements(), proof)
            .map_err(|e| VerifierError::VerificationFailed(e.to_string()))
    }

    /// Verify a proof and check it commits to `expected` registry status.
    pub fn verify_with_status_commitment(
        &self,
        bundle: &ProofBundle,
        expected: &[u8; 32],
    ) -> VerifierResult<bool> {
        if &bundle.public_inputs.status_commitment != expected {
            return Err(VerifierError::StatusCommitmentMismatch);
        }

        self.verify(bundle)
    }

    /// Verify the on-chain encoding directly.
    pub fn verify_chain(&self, chain: &ChainProof) -> VerifierResult<bool> {
        let proof = decode_proof(&chain.proof)?;
        let inputs = decode_public_inputs(&chain.public_inputs)?;
        self.verify_inputs(&proof, &inputs)
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.verifying_key
    }

    /// Compressed arkworks encoding of the verifying key, hex.
    pub fn verifying_key_hex(&self) -> VerifierResult<String> {
        let mut bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| VerifierError::SerializationError(e.to_string()))?;
        Ok(hex::encode(bytes))
    }

    /// Load verifier from a key file.
    pub fn load(path: &Path) -> VerifierResult<Self> {
        Self::new(load_verifying_key(path)?)
    }
}

/// Verification result with additional metadata.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub is_valid: bool,
    pub layout_version: u8,
    pub public_input_count: usize,
    pub public_inputs: PublicInputs,
}

impl ClaimVerifier {
    /// Verify an on-chain encoded proof and produce a detailed report.
    pub fn verify_with_report(&self, chain: &ChainProof) -> VerifierResult<VerificationReport> {
        let proof = decode_proof(&chain.proof)?;
        let public_inputs = decode_public_inputs(&chain.public_inputs)?;
        let is_valid = self.verify_inputs(&proof, &public_inputs)?;

        Ok(VerificationReport {
            is_valid,
            layout_version: PUBLIC_INPUT_LAYOUT_VERSION,
            public_input_count: PUBLIC_INPUT_COUNT,
            public_inputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::encode_for_chain;
    use crate::circuit::ClaimWitness;
    use crate::primitives::Address;
    use crate::prover::test_support::keys;

    fn bundle() -> ProofBundle {
        let mut w = ClaimWitness::blank();
        w.nuip[..9].copy_from_slice(b"123456789");
        w.server_name[..13].copy_from_slice(b"registry.test");
        w.recipient = Address([0xab; 20]);
        keys().0.prove(&w).unwrap()
    }

    #[test]
    fn test_verify_chain_encoding() {
        let verifier = ClaimVerifier::new(keys().1.clone()).unwrap();
        let chain = encode_for_chain(&bundle());
        assert!(verifier.verify_chain(&chain).unwrap());
    }

    #[test]
    fn test_verify_with_wrong_status_commitment() {
        let verifier = ClaimVerifier::new(keys().1.clone()).unwrap();
        let result = verifier.verify_with_status_commitment(&bundle(), &[0u8; 32]);
        assert!(matches!(result, Err(VerifierError::StatusCommitmentMismatch)));
    }

    #[test]
    fn test_tampered_public_input_fails() {
        let verifier = ClaimVerifier::new(keys().1.clone()).unwrap();
        let mut chain = encode_for_chain(&bundle());
        chain.public_inputs[60] = format!("0x{:064x}", 7);
        assert!(!verifier.verify_chain(&chain).unwrap());
    }

    #[test]
    fn test_verification_report() {
        let verifier = ClaimVerifier::new(keys().1.clone()).unwrap();
        let proof = bundle();
        let report = verifier.verify_with_report(&encode_for_chain(&proof)).unwrap();

        assert!(report.is_valid);
        assert_eq!(report.public_input_count, 116);
        assert_eq!(report.public_inputs, proof.public_inputs);
        assert!(!verifier.verifying_key_hex().unwrap().is_empty());
    }
}
