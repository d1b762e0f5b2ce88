//! ProofHeir - prove a testator's death without revealing who they are
//!
//! An heir proves, in zero knowledge, that a civil registry reports the
//! testator as deceased, binding the proof to an identity commitment the
//! testator registered on chain beforehand.
//!
//! # Architecture
//!
//! 1. Heir submits recipient, NUIP, salt and testator address
//! 2. A notary fetches the registry record and signs the transcript
//! 3. The status is read only from attested bytes
//! 4. A Groth16 proof ties recipient, registry host, identity commitment
//!    and status commitment together
//! 5. The proof is encoded for the on-chain verifier

pub mod api;
pub mod chain;
pub mod circuit;
pub mod commitment;
pub mod config;
pub mod error;
pub mod extractor;
pub mod notary;
pub mod pipeline;
pub mod primitives;
pub mod prover;
pub mod public_inputs;
pub mod verifier;

// Re-export main types
pub use chain::ChainProof;
pub use commitment::{commit, IdentityCommitment, Salt};
pub use error::{ClaimError, ClaimErrorKind, ClaimStage};
pub use pipeline::{ClaimPipeline, ClaimRequest, PipelineOptions};
pub use prover::{ClaimProver, ProofBundle};
pub use public_inputs::PublicInputs;
pub use verifier::ClaimVerifier;
