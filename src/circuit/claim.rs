//! Inheritance claim circuit.
//!
//! Proves, for the 116 public byte-inputs described in
//! [`crate::public_inputs`], knowledge of private values such that:
//!
//! 1. `SHA-256(nuip || salt) == id_commitment`
//! 2. `SHA-256(server_name) == server_hash`
//! 3. `SHA-256(status || blinder) == status_commitment`
//! 4. `status == "No Vigente (Fallecido)"`
//!
//! The recipient is bound only as a public input: a proof made for one
//! recipient does not verify against another.
//!
//! Public inputs: recipient[20], server_hash[32], id_commitment[32],
//! status_commitment[32], one byte per field element.
//!
//! Private witnesses: nuip[15], salt[32], server_name[40], status[22],
//! blinder[16].

use ark_bn254::Fr;
use ark_crypto_primitives::crh::sha256::constraints::Sha256Gadget;
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::fp::FpVar,
    uint8::UInt8,
    ToBitsGadget,
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::witness::{ClaimWitness, STATUS_LEN};
use crate::commitment::{NUIP_LEN, SALT_LEN};
use crate::extractor::STATUS_DECEASED;
use crate::notary::attestation::BLINDER_LEN;
use crate::public_inputs::{
    PUBLIC_INPUT_COUNT, ID_COMMITMENT, SERVER_HASH, SERVER_NAME_LEN, STATUS_COMMITMENT,
};

#[derive(Clone)]
pub struct ClaimCircuit {
    /// Public: the layout bytes, in order.
    pub public_bytes: Option<[u8; PUBLIC_INPUT_COUNT]>,

    /// Private
    pub nuip: Option<[u8; NUIP_LEN]>,
    pub salt: Option<[u8; SALT_LEN]>,
    pub server_name: Option<[u8; SERVER_NAME_LEN]>,
    pub status: Option<[u8; STATUS_LEN]>,
    pub blinder: Option<[u8; BLINDER_LEN]>,
}

impl ClaimCircuit {
    /// Circuit over the blank witness, for key setup.
    pub fn new_empty() -> Self {
        Self::new_with_witness(&ClaimWitness::blank())
    }

    pub fn new_with_witness(witness: &ClaimWitness) -> Self {
        Self {
            public_bytes: Some(witness.public_inputs().to_bytes()),
            nuip: Some(witness.nuip),
            salt: Some(witness.salt),
            server_name: Some(witness.server_name),
            status: Some(witness.status),
            blinder: Some(witness.blinder),
        }
    }
}

impl ConstraintSynthesizer<Fr> for ClaimCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Public inputs, each pinned to an 8-bit decomposition
        let mut public = Vec::with_capacity(PUBLIC_INPUT_COUNT);
        for index in 0..PUBLIC_INPUT_COUNT {
            let value = self.public_bytes.map(|bytes| bytes[index]);
            let input = FpVar::new_input(cs.clone(), || {
                value
                    .map(|b| Fr::from(b as u64))
                    .ok_or(SynthesisError::AssignmentMissing)
            })?;
            let byte = UInt8::new_witness(cs.clone(), || value.ok_or(SynthesisError::AssignmentMissing))?;
            Boolean::le_bits_to_fp_var(&byte.to_bits_le()?)?.enforce_equal(&input)?;
            public.push(byte);
        }

        let nuip = alloc_bytes(cs.clone(), self.nuip.as_ref().map(|b| &b[..]), NUIP_LEN)?;
        let salt = alloc_bytes(cs.clone(), self.salt.as_ref().map(|b| &b[..]), SALT_LEN)?;
        let server_name = alloc_bytes(cs.clone(), self.server_name.as_ref().map(|b| &b[..]), SERVER_NAME_LEN)?;
        let status = alloc_bytes(cs.clone(), self.status.as_ref().map(|b| &b[..]), STATUS_LEN)?;
        let blinder = alloc_bytes(cs, self.blinder.as_ref().map(|b| &b[..]), BLINDER_LEN)?;

        let id_commitment = Sha256Gadget::<Fr>::digest(&[nuip, salt].concat())?;
        id_commitment.0.as_slice().enforce_equal(&public[ID_COMMITMENT])?;

        let server_hash = Sha256Gadget::<Fr>::digest(&server_name)?;
        server_hash.0.as_slice().enforce_equal(&public[SERVER_HASH])?;

        let status_commitment = Sha256Gadget::<Fr>::digest(&[status.clone(), blinder].concat())?;
        status_commitment.0.as_slice().enforce_equal(&public[STATUS_COMMITMENT])?;

        let deceased = UInt8::constant_vec(STATUS_DECEASED);
        status.as_slice().enforce_equal(deceased.as_slice())?;

        Ok(())
    }
}

fn alloc_bytes(
    cs: ConstraintSystemRef<Fr>,
    value: Option<&[u8]>,
    len: usize,
) -> Result<Vec<UInt8<Fr>>, SynthesisError> {
    (0..len)
        .map(|i| {
            UInt8::new_witness(cs.clone(), || {
                value.map(|v| v[i]).ok_or(SynthesisError::AssignmentMissing)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notary::attestation::plaintext_hash;
    use crate::public_inputs::RECIPIENT;
    use ark_relations::r1cs::ConstraintSystem;

    fn witness() -> ClaimWitness {
        let mut w = ClaimWitness::blank();
        w.nuip[..9].copy_from_slice(b"123456789");
        w.salt = [0x11; SALT_LEN];
        w.server_name[..13].copy_from_slice(b"registry.test");
        w.blinder = [7u8; BLINDER_LEN];
        w.recipient = crate::primitives::Address([0xab; 20]);
        w
    }

    fn satisfied(circuit: ClaimCircuit) -> bool {
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        cs.is_satisfied().unwrap()
    }

    #[test]
    fn test_claim_circuit_valid() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        ClaimCircuit::new_with_witness(&witness())
            .generate_constraints(cs.clone())
            .unwrap();

        println!("Claim circuit constraints: {}", cs.num_constraints());
        assert_eq!(cs.num_instance_variables(), PUBLIC_INPUT_COUNT + 1);
        assert!(cs.is_satisfied().unwrap(), "Circuit should be satisfied");
    }

    #[test]
    fn test_claim_circuit_setup() {
        assert!(satisfied(ClaimCircuit::new_empty()), "Setup circuit should be satisfied");
    }

    #[test]
    fn test_wrong_identity_commitment_unsatisfied() {
        let mut circuit = ClaimCircuit::new_with_witness(&witness());
        circuit.salt = Some([0x12; SALT_LEN]);
        assert!(!satisfied(circuit));
    }

    #[test]
    fn test_non_deceased_status_unsatisfied() {
        // Same length as the deceased string, with a consistent commitment.
        let status = *b"No Vigente (Cancelado)";
        let mut w = witness();
        w.status = status;
        let circuit = ClaimCircuit::new_with_witness(&w);
        assert_eq!(
            &circuit.public_bytes.unwrap()[STATUS_COMMITMENT],
            &plaintext_hash(&status, &w.blinder)
        );
        assert!(!satisfied(circuit));
    }

    #[test]
    fn test_recipient_is_free_public_input() {
        // Any recipient satisfies the relation; Groth16 binds it at verification.
        let mut circuit = ClaimCircuit::new_with_witness(&witness());
        if let Some(bytes) = circuit.public_bytes.as_mut() {
            bytes[RECIPIENT].copy_from_slice(&[0xcd; 20]);
        }
        assert!(satisfied(circuit));
    }
}
