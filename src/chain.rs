//! On-chain encoding of claim proofs.
//!
//! `proof` is 256 bytes of big-endian words in EVM pairing-precompile order:
//! `A.x, A.y, B.x.c1, B.x.c0, B.y.c1, B.y.c0, C.x, C.y`. The point at
//! infinity is encoded as all-zero coordinates. `publicInputs` holds one
//! `bytes32` word per public input.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInt, PrimeField, Zero};
use ark_groth16::Proof;
use serde::{Deserialize, Serialize};

use crate::primitives::{decode_fixed_hex, strip_hex_prefix, to_prefixed_hex, HexError};
use crate::prover::ProofBundle;
use crate::public_inputs::{PublicInputError, PublicInputs, PUBLIC_INPUT_COUNT};

pub const PROOF_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainEncodingError {
    #[error("proof is not hex: {0}")]
    ProofHex(String),

    #[error("proof must be 256 bytes, got {0}")]
    ProofLength(usize),

    #[error("proof coordinate {0} is not a canonical field element")]
    NonCanonicalCoordinate(usize),

    #[error("proof point {0} is not on the curve or not in the prime-order subgroup")]
    InvalidPoint(&'static str),

    #[error("public input {index}: {source}")]
    PublicInputHex { index: usize, source: HexError },

    #[error("public input {0} is not a canonical field element")]
    NonCanonicalInput(usize),

    #[error(transparent)]
    Layout(#[from] PublicInputError),
}

/// `{ proof, publicInputs }` as the contract receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProof {
    pub proof: String,
    pub public_inputs: Vec<String>,
}

pub fn encode_for_chain(bundle: &ProofBundle) -> ChainProof {
    ChainProof {
        proof: to_prefixed_hex(&encode_proof(&bundle.proof)),
        public_inputs: bundle
            .public_inputs
            .to_field_elements()
            .iter()
            .map(|fe| to_prefixed_hex(&field_to_word(fe)))
            .collect(),
    }
}

pub fn encode_proof(proof: &Proof<Bn254>) -> [u8; PROOF_LEN] {
    let (ax, ay) = g1_coords(&proof.a);
    let (bx, by) = g2_coords(&proof.b);
    let (cx, cy) = g1_coords(&proof.c);

    let words = [ax, ay, bx.c1, bx.c0, by.c1, by.c0, cx, cy];
    let mut out = [0u8; PROOF_LEN];
    for (chunk, word) in out.chunks_exact_mut(32).zip(words.iter()) {
        chunk.copy_from_slice(&field_to_word(word));
    }
    out
}

pub fn decode_proof(encoded: &str) -> Result<Proof<Bn254>, ChainEncodingError> {
    let bytes = hex::decode(strip_hex_prefix(encoded.trim()))
        .map_err(|e| ChainEncodingError::ProofHex(e.to_string()))?;
    if bytes.len() != PROOF_LEN {
        return Err(ChainEncodingError::ProofLength(bytes.len()));
    }

    let mut coords = [Fq::zero(); 8];
    for (index, chunk) in bytes.chunks_exact(32).enumerate() {
        let mut word = [0u8; 32];
        word.copy_from_slice(chunk);
        coords[index] = word_to_field(&word).ok_or(ChainEncodingError::NonCanonicalCoordinate(index))?;
    }

    let a = g1_point(coords[0], coords[1]).ok_or(ChainEncodingError::InvalidPoint("A"))?;
    let b = g2_point(Fq2::new(coords[3], coords[2]), Fq2::new(coords[5], coords[4]))
        .ok_or(ChainEncodingError::InvalidPoint("B"))?;
    let c = g1_point(coords[6], coords[7]).ok_or(ChainEncodingError::InvalidPoint("C"))?;

    Ok(Proof { a, b, c })
}

/// Decode `publicInputs`; each element must be a canonical word holding one byte.
pub fn decode_public_inputs(words: &[String]) -> Result<PublicInputs, ChainEncodingError> {
    if words.len() != PUBLIC_INPUT_COUNT {
        return Err(PublicInputError::WrongCount {
            expected: PUBLIC_INPUT_COUNT,
            actual: words.len(),
        }
        .into());
    }

    let elements = words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            let bytes = decode_fixed_hex::<32>(word)
                .map_err(|source| ChainEncodingError::PublicInputHex { index, source })?;
            word_to_field::<Fr>(&bytes).ok_or(ChainEncodingError::NonCanonicalInput(index))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PublicInputs::from_field_elements(&elements)?)
}

/// Big-endian 32-byte word.
pub fn field_to_word<F: PrimeField<BigInt = BigInt<4>>>(element: &F) -> [u8; 32] {
    let limbs = element.into_bigint().0;
    let mut out = [0u8; 32];
    for (i, limb) in limbs.iter().enumerate() {
        out[24 - 8 * i..32 - 8 * i].copy_from_slice(&limb.to_be_bytes());
    }
    out
}

/// Inverse of [`field_to_word`]; `None` for values at or above the modulus.
pub fn word_to_field<F: PrimeField<BigInt = BigInt<4>>>(word: &[u8; 32]) -> Option<F> {
    let mut limbs = [0u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let mut be = [0u8; 8];
        be.copy_from_slice(&word[24 - 8 * i..32 - 8 * i]);
        *limb = u64::from_be_bytes(be);
    }
    F::from_bigint(BigInt::new(limbs))
}

fn g1_coords(point: &G1Affine) -> (Fq, Fq) {
    point.xy().map(|(x, y)| (*x, *y)).unwrap_or((Fq::zero(), Fq::zero()))
}

fn g2_coords(point: &G2Affine) -> (Fq2, Fq2) {
    point.xy().map(|(x, y)| (*x, *y)).unwrap_or((Fq2::zero(), Fq2::zero()))
}

fn g1_point(x: Fq, y: Fq) -> Option<G1Affine> {
    if x.is_zero() && y.is_zero() {
        return Some(G1Affine::identity());
    }
    let point = G1Affine::new_unchecked(x, y);
    (point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve()).then_some(point)
}

fn g2_point(x: Fq2, y: Fq2) -> Option<G2Affine> {
    if x.is_zero() && y.is_zero() {
        return Some(G2Affine::identity());
    }
    let point = G2Affine::new_unchecked(x, y);
    (point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve()).then_some(point)
}
