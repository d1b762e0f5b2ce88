//! Witness assembly for the claim circuit.

use crate::commitment::{commit_padded, pad_nuip, Salt, NUIP_LEN, SALT_LEN};
use crate::extractor::{ClaimFact, LifeStatus, STATUS_DECEASED};
use crate::notary::attestation::{plaintext_hash, BLINDER_LEN};
use crate::primitives::Address;
use crate::prover::ProverError;
use crate::public_inputs::{pad_server_name, PublicInputs, SERVER_NAME_LEN};
use sha2::{Digest, Sha256};

/// Width of the status field: `"No Vigente (Fallecido)"`.
pub const STATUS_LEN: usize = 22;

/// Everything the prover knows about one claim.
#[derive(Clone)]
pub struct ClaimWitness {
    pub recipient: Address,
    pub testator: Address,
    pub nuip: [u8; NUIP_LEN],
    pub salt: [u8; SALT_LEN],
    pub server_name: [u8; SERVER_NAME_LEN],
    pub status: [u8; STATUS_LEN],
    pub blinder: [u8; BLINDER_LEN],
}

impl ClaimWitness {
    /// Assemble a witness from a notary-backed fact and the heir's secrets.
    ///
    /// Fails with [`ProverError::WitnessUnsatisfiable`] unless the fact
    /// records a death and its opening matches the attested commitment.
    pub fn new(
        fact: &ClaimFact,
        nuip: &str,
        salt: &Salt,
        recipient: Address,
        testator: Address,
    ) -> Result<Self, ProverError> {
        if fact.status != LifeStatus::Deceased {
            return Err(ProverError::WitnessUnsatisfiable(format!(
                "registry status is {}, not deceased",
                fact.status.as_str()
            )));
        }
        let status: [u8; STATUS_LEN] = fact.status_bytes.as_slice().try_into().map_err(|_| {
            ProverError::WitnessUnsatisfiable(format!(
                "status is {} bytes, circuit expects {}",
                fact.status_bytes.len(),
                STATUS_LEN
            ))
        })?;
        if plaintext_hash(&status, &fact.status_blinder) != fact.status_commitment {
            return Err(ProverError::WitnessUnsatisfiable(
                "status opening does not match the attested commitment".to_string(),
            ));
        }

        let nuip = pad_nuip(nuip).map_err(|e| ProverError::WitnessUnsatisfiable(e.to_string()))?;
        let server_name =
            pad_server_name(&fact.server_name).map_err(|e| ProverError::Internal(e.to_string()))?;

        Ok(Self {
            recipient,
            testator,
            nuip,
            salt: *salt.as_bytes(),
            server_name,
            status,
            blinder: fact.status_blinder,
        })
    }

    /// A satisfying witness over fixed dummy values, used for key setup.
    pub fn blank() -> Self {
        let mut nuip = [0u8; NUIP_LEN];
        nuip[0] = b'0';
        let mut status = [0u8; STATUS_LEN];
        status.copy_from_slice(STATUS_DECEASED);

        Self {
            recipient: Address([0u8; 20]),
            testator: Address([0u8; 20]),
            nuip,
            salt: [0u8; SALT_LEN],
            server_name: [b' '; SERVER_NAME_LEN],
            status,
            blinder: [0u8; BLINDER_LEN],
        }
    }

    pub fn public_inputs(&self) -> PublicInputs {
        PublicInputs {
            recipient: self.recipient,
            server_hash: Sha256::digest(self.server_name).into(),
            id_commitment: commit_padded(&self.nuip, &self.salt),
            status_commitment: plaintext_hash(&self.status, &self.blinder),
        }
    }
}
