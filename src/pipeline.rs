//! Claim pipeline: validate, notarize, extract, prove, encode.

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::VerifyingKey as NotaryKey;
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::chain::{encode_for_chain, ChainProof};
use crate::circuit::ClaimWitness;
use crate::commitment::{pad_nuip, Salt};
use crate::error::{ClaimError, ClaimErrorKind, ClaimStage};
use crate::extractor;
use crate::notary::{fetch_attested, NotarizeRequest, RegistryTemplate, RetryPolicy, TranscriptNotary};
use crate::primitives::Address;
use crate::prover::{ClaimProver, ProofBundle};
use crate::verifier::ClaimVerifier;

/// Body of `POST /api/generate-proof`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub recipient: String,
    pub nuip: String,
    pub salt: String,
    #[serde(alias = "testatorAddress")]
    pub testator_address: String,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedClaim {
    pub recipient: Address,
    pub testator: Address,
    pub nuip: String,
    pub nuip_value: u64,
    pub salt: Salt,
}

impl ClaimRequest {
    pub fn validate(&self) -> Result<ValidatedClaim, ClaimError> {
        let recipient = Address::parse(&self.recipient)
            .map_err(|e| ClaimError::validation(format!("recipient: {}", e)))?;
        let testator = Address::parse(&self.testator_address)
            .map_err(|e| ClaimError::validation(format!("testator_address: {}", e)))?;
        let salt = Salt::parse(&self.salt)?;

        pad_nuip(&self.nuip)?;
        let nuip_value = self
            .nuip
            .parse::<u64>()
            .map_err(|e| ClaimError::validation(format!("nuip: {}", e)))?;

        Ok(ValidatedClaim {
            recipient,
            testator,
            nuip: self.nuip.clone(),
            nuip_value,
            salt,
        })
    }
}

/// Tunables for [`ClaimPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub retry: RetryPolicy,
    pub proving_timeout: Duration,
    pub prover_workers: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            proving_timeout: Duration::from_secs(60),
            prover_workers: 2,
        }
    }
}

/// Runs claims end to end. Holds only shared, immutable state.
pub struct ClaimPipeline {
    notary: Arc<dyn TranscriptNotary>,
    notary_key: NotaryKey,
    registry: RegistryTemplate,
    prover: Arc<ClaimProver>,
    verifier: Arc<ClaimVerifier>,
    provers: Arc<Semaphore>,
    options: PipelineOptions,
}

impl ClaimPipeline {
    pub fn new(
        notary: Arc<dyn TranscriptNotary>,
        notary_key: NotaryKey,
        registry: RegistryTemplate,
        prover: Arc<ClaimProver>,
        verifier: Arc<ClaimVerifier>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            notary,
            notary_key,
            registry,
            prover,
            verifier,
            provers: Arc::new(Semaphore::new(options.prover_workers.max(1))),
            options,
        }
    }

    pub fn verifier(&self) -> &ClaimVerifier {
        &self.verifier
    }

    pub async fn run(&self, request: &ClaimRequest) -> Result<ChainProof, ClaimError> {
        let result = self.execute(request).await;
        if let Err(err) = &result {
            tracing::warn!(
                stage = %err.stage,
                kind = %err.kind,
                retryable = err.is_retryable(),
                "claim failed"
            );
        }
        result
    }

    async fn execute(&self, request: &ClaimRequest) -> Result<ChainProof, ClaimError> {
        transition(ClaimStage::Validating);
        let claim = request.validate()?;

        transition(ClaimStage::Notarizing);
        let notarize = NotarizeRequest::new(self.registry.request_for(claim.nuip_value));
        let attested =
            fetch_attested(self.notary.as_ref(), &notarize, &self.notary_key, &self.options.retry).await?;

        transition(ClaimStage::Extracting);
        let fact = extractor::extract(&attested, claim.nuip_value)?;
        tracing::debug!(status = fact.status.as_str(), server = %fact.server_name, "registry fact extracted");

        transition(ClaimStage::Proving);
        let witness = ClaimWitness::new(&fact, &claim.nuip, &claim.salt, claim.recipient, claim.testator)?;
        let bundle = self.prove(witness).await?;

        // The proof must verify and commit to the status the notary attested.
        if !self
            .verifier
            .verify_with_status_commitment(&bundle, &fact.status_commitment)?
        {
            return Err(ClaimError::internal(ClaimStage::Proving, "generated proof does not verify"));
        }

        transition(ClaimStage::Encoding);
        let encoded = encode_for_chain(&bundle);

        transition(ClaimStage::Done);
        tracing::info!(recipient = %claim.recipient, testator = %bundle.testator, "claim proof ready");
        Ok(encoded)
    }

    /// Prove on the blocking pool, bounded by the worker semaphore and the
    /// proving deadline. On timeout the worker keeps its permit until the
    /// abandoned proof finishes.
    async fn prove(&self, witness: ClaimWitness) -> Result<ProofBundle, ClaimError> {
        let provers = self.provers.clone();
        let prover = self.prover.clone();
        let deadline = self.options.proving_timeout;

        let proving = async move {
            let permit = provers
                .acquire_owned()
                .await
                .map_err(|_| ClaimError::internal(ClaimStage::Proving, "prover pool closed"))?;

            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                prover.prove(&witness)
            })
            .await
            .map_err(|e| ClaimError::internal(ClaimStage::Proving, format!("prover task failed: {}", e)))?
            .map_err(ClaimError::from)
        };

        tokio::time::timeout(deadline, proving).await.map_err(|_| {
            ClaimError::new(
                ClaimStage::Proving,
                ClaimErrorKind::ProvingTimeout,
                format!("proving did not finish within {:?}", deadline),
            )
        })?
    }
}

fn transition(stage: ClaimStage) {
    tracing::debug!(stage = %stage, "claim stage");
}
