//! Groth16 proof generation for inheritance claims.

use ark_bn254::Bn254;
use ark_groth16::{Groth16, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use rand::rngs::OsRng;
use std::path::Path;

use crate::circuit::{ClaimCircuit, ClaimWitness};
use crate::primitives::Address;
use crate::public_inputs::{PublicInputs, PUBLIC_INPUT_LAYOUT_VERSION};

/// Result type for prover operations.
pub type ProverResult<T> = Result<T, ProverError>;

/// Errors that can occur during proving.
#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    #[error("Trusted setup failed: {0}")]
    SetupFailed(String),

    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("Witness cannot satisfy the claim circuit: {0}")]
    WitnessUnsatisfiable(String),

    #[error("Key file has layout version {found}, expected {expected}")]
    LayoutMismatch { expected: u8, found: u8 },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal prover error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Seed for the circuit-specific setup. Reproducible, so NOT a ceremony:
/// production deployments load ceremony keys from disk instead.
const SETUP_SEED: u64 = 0x5052_4f4f_4648_4549;

const PROVING_KEY_MAGIC: &[u8; 4] = b"PHPK";
const VERIFYING_KEY_MAGIC: &[u8; 4] = b"PHVK";

/// A claim proof with the values it is public about.
#[derive(Clone, Debug)]
pub struct ProofBundle {
    pub proof: Proof<Bn254>,
    pub public_inputs: PublicInputs,
    /// Carried for the caller; bound through the registered `id_commitment`.
    pub testator: Address,
}

/// Prover for inheritance claims.
pub struct ClaimProver {
    proving_key: ProvingKey<Bn254>,
}

impl ClaimProver {
    /// Deterministic circuit-specific setup.
    pub fn setup() -> ProverResult<(Self, VerifyingKey<Bn254>)> {
        let circuit = ClaimCircuit::new_empty();
        let mut rng = StdRng::seed_from_u64(SETUP_SEED);

        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit, &mut rng)
            .map_err(|e| ProverError::SetupFailed(e.to_string()))?;

        Ok((Self { proving_key: pk }, vk))
    }

    pub fn from_proving_key(proving_key: ProvingKey<Bn254>) -> Self {
        Self { proving_key }
    }

    /// Prove a claim. Each call draws fresh randomness, so two proofs of the
    /// same witness differ byte-wise while both verify.
    pub fn prove(&self, witness: &ClaimWitness) -> ProverResult<ProofBundle> {
        let circuit = ClaimCircuit::new_with_witness(witness);

        let proof = Groth16::<Bn254>::prove(&self.proving_key, circuit, &mut OsRng)
            .map_err(|e| ProverError::ProofGenerationFailed(e.to_string()))?;

        Ok(ProofBundle {
            proof,
            public_inputs: witness.public_inputs(),
            testator: witness.testator,
        })
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.proving_key.vk
    }

    /// Save proving key to file, behind a magic and layout-version header.
    pub fn save_proving_key(&self, path: &Path) -> ProverResult<()> {
        write_key(path, PROVING_KEY_MAGIC, &self.proving_key)
    }

    /// Load proving key from file.
    pub fn load_proving_key(path: &Path) -> ProverResult<Self> {
        let proving_key = read_key(path, PROVING_KEY_MAGIC)?;
        Ok(Self { proving_key })
    }
}

/// Save verifying key to file.
pub fn save_verifying_key(vk: &VerifyingKey<Bn254>, path: &Path) -> ProverResult<()> {
    write_key(path, VERIFYING_KEY_MAGIC, vk)
}

/// Load verifying key from file.
pub fn load_verifying_key(path: &Path) -> ProverResult<VerifyingKey<Bn254>> {
    read_key(path, VERIFYING_KEY_MAGIC)
}

fn write_key<K: CanonicalSerialize>(path: &Path, magic: &[u8; 4], key: &K) -> ProverResult<()> {
    let mut file_bytes = magic.to_vec();
    file_bytes.push(PUBLIC_INPUT_LAYOUT_VERSION);
    key.serialize_compressed(&mut file_bytes)
        .map_err(|e| ProverError::SerializationError(e.to_string()))?;

    std::fs::write(path, file_bytes)?;
    Ok(())
}

fn read_key<K: CanonicalDeserialize>(path: &Path, magic: &[u8; 4]) -> ProverResult<K> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 5 || &bytes[..4] != magic {
        return Err(ProverError::SerializationError(format!(
            "{} is not a {} key file",
            path.display(),
            String::from_utf8_lossy(magic)
        )));
    }
    if bytes[4] != PUBLIC_INPUT_LAYOUT_VERSION {
        return Err(ProverError::LayoutMismatch {
            expected: PUBLIC_INPUT_LAYOUT_VERSION,
            found: bytes[4],
        });
    }

    K::deserialize_compressed(&bytes[5..]).map_err(|e| ProverError::SerializationError(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, OnceLock};

    static KEYS: OnceLock<(Arc<ClaimProver>, VerifyingKey<Bn254>)> = OnceLock::new();

    /// One setup per test binary.
    pub fn keys() -> &'static (Arc<ClaimProver>, VerifyingKey<Bn254>) {
        KEYS.get_or_init(|| {
            let (prover, vk) = ClaimProver::setup().unwrap();
            (Arc::new(prover), vk)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::keys;
    use super::*;
    use crate::verifier::ClaimVerifier;

    fn witness(recipient: u8) -> ClaimWitness {
        let mut w = ClaimWitness::blank();
        w.nuip[..9].copy_from_slice(b"123456789");
        w.salt = [0x11; 32];
        w.server_name[..13].copy_from_slice(b"registry.test");
        w.blinder = [3u8; 16];
        w.recipient = Address([recipient; 20]);
        w.testator = Address([0xcd; 20]);
        w
    }

    #[test]
    fn test_setup_and_prove() {
        let (prover, vk) = keys();
        let bundle = prover.prove(&witness(0xab)).unwrap();

        let verifier = ClaimVerifier::new(vk.clone()).unwrap();
        assert!(verifier.verify(&bundle).unwrap());
        assert_eq!(bundle.testator, Address([0xcd; 20]));
    }

    #[test]
    fn test_setup_is_deterministic() {
        let (_, vk) = keys();
        let (_, again) = ClaimProver::setup().unwrap();
        assert_eq!(vk, &again);
    }

    #[test]
    fn test_recipient_replay_rejected() {
        let (prover, vk) = keys();
        let verifier = ClaimVerifier::new(vk.clone()).unwrap();

        let for_a = prover.prove(&witness(0xaa)).unwrap();
        let b_inputs = witness(0xbb).public_inputs();
        assert!(!verifier.verify_inputs(&for_a.proof, &b_inputs).unwrap());
    }

    #[test]
    fn test_proofs_are_randomized() {
        let (prover, vk) = keys();
        let verifier = ClaimVerifier::new(vk.clone()).unwrap();

        let first = prover.prove(&witness(0xab)).unwrap();
        let second = prover.prove(&witness(0xab)).unwrap();

        assert_ne!(first.proof, second.proof);
        assert!(verifier.verify(&first).unwrap());
        assert!(verifier.verify(&second).unwrap());
    }

    #[test]
    fn test_key_files() {
        let (prover, vk) = keys();
        let dir = std::env::temp_dir().join(format!("proofheir-keys-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let pk_path = dir.join("claim.pk");
        let vk_path = dir.join("claim.vk");

        prover.save_proving_key(&pk_path).unwrap();
        save_verifying_key(vk, &vk_path).unwrap();

        let loaded = ClaimProver::load_proving_key(&pk_path).unwrap();
        assert_eq!(loaded.verifying_key(), vk);
        assert_eq!(&load_verifying_key(&vk_path).unwrap(), vk);

        // A verifying key is not a proving key.
        assert!(matches!(
            ClaimProver::load_proving_key(&vk_path),
            Err(ProverError::SerializationError(_))
        ));

        let mut stale = std::fs::read(&vk_path).unwrap();
        stale[4] = 0;
        std::fs::write(&vk_path, stale).unwrap();
        assert!(matches!(
            load_verifying_key(&vk_path),
            Err(ProverError::LayoutMismatch { expected: 1, found: 0 })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
