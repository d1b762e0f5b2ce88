//! Attested fetching of civil-registry responses.
//!
//! A [`TranscriptNotary`] returns an [`AttestedTranscript`]: the HTTP exchange
//! with the registry plus a notary signature over its digest, the ranges the
//! notary revealed and hash commitments over the ranges it kept hidden.
//! [`fetch_attested`] is the entry point the claim pipeline uses; it retries
//! transient failures and refuses anything that does not verify.

pub mod attestation;
pub mod client;
pub mod json;
pub mod request;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transcript;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use ed25519_dalek::VerifyingKey;

pub use attestation::{AttestationError, AttestedTranscript};
pub use client::{LocalNotary, RemoteNotary};
pub use request::{DisclosurePolicy, NotarizeRequest, RegistryRequest, RegistryTemplate};
pub use session::{HttpsTransport, Notary, RegistryResponse, RegistryTransport, TransportError};
pub use transcript::{ByteRange, Direction, Transcript};

/// Errors from obtaining an attested transcript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotaryError {
    #[error("registry connection failed: {0}")]
    ConnectionFailed(String),

    #[error("notary unavailable: {0}")]
    NotaryUnavailable(String),

    #[error("registry rejected the lookup with HTTP {status}")]
    ServerRejected { status: u16 },

    #[error("attestation rejected: {0}")]
    DisclosureMismatch(String),

    #[error("invalid registry request: {0}")]
    InvalidRequest(String),
}

impl NotaryError {
    /// Worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::NotaryUnavailable(_))
    }

    /// Wire code used by the notary role's error replies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::NotaryUnavailable(_) => "NOTARY_UNAVAILABLE",
            Self::ServerRejected { .. } => "SERVER_REJECTED",
            Self::DisclosureMismatch(_) => "DISCLOSURE_MISMATCH",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

/// Anything able to notarize one registry exchange.
#[async_trait]
pub trait TranscriptNotary: Send + Sync {
    async fn notarize(&self, request: &NotarizeRequest) -> Result<AttestedTranscript, NotaryError>;
}

/// Bounds on notarization retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Overall deadline across all attempts.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            deadline: Duration::from_secs(30),
        }
    }
}

/// Notarize `request`, retrying transient failures, then verify the result.
///
/// The returned transcript carries a valid signature from `notary_key`, names
/// the requested host and holds a 2xx registry response.
pub async fn fetch_attested(
    notary: &dyn TranscriptNotary,
    request: &NotarizeRequest,
    notary_key: &VerifyingKey,
    retry: &RetryPolicy,
) -> Result<AttestedTranscript, NotaryError> {
    let (_, expected_host) = request
        .request
        .target()
        .map_err(|e| NotaryError::InvalidRequest(e.to_string()))?;

    let attempts = AtomicU32::new(0);
    let attempts = &attempts;
    let max_attempts = retry.max_attempts.max(1);
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(retry.initial_backoff)
        .with_max_interval(retry.max_backoff)
        .with_max_elapsed_time(Some(retry.deadline))
        .build();

    let operation = move || async move {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match notary.notarize(request).await {
            Ok(transcript) => Ok(transcript),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, error = %e, "notarization failed, retrying");
                Err(backoff::Error::transient(e))
            }
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    };

    let attested = tokio::time::timeout(retry.deadline, backoff::future::retry(policy, operation))
        .await
        .map_err(|_| {
            NotaryError::ConnectionFailed(format!(
                "notarization did not finish within {:?}",
                retry.deadline
            ))
        })??;

    attested
        .verify(notary_key)
        .map_err(|e| NotaryError::DisclosureMismatch(e.to_string()))?;

    if attested.server_name() != expected_host {
        return Err(NotaryError::DisclosureMismatch(format!(
            "attested server {} does not match requested {}",
            attested.server_name(),
            expected_host
        )));
    }

    let view = transcript::parse_response(attested.transcript.received())
        .map_err(|e| NotaryError::DisclosureMismatch(e.to_string()))?;
    if !view.is_success() {
        return Err(NotaryError::ServerRejected { status: view.status });
    }

    Ok(attested)
}

/// Base64 for binary fields in JSON.
pub(crate) mod serde_b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notary::testing::FixtureRegistry;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use std::sync::Arc;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            deadline: Duration::from_secs(5),
        }
    }

    fn setup(registry: FixtureRegistry) -> (Arc<FixtureRegistry>, LocalNotary, VerifyingKey) {
        let registry = Arc::new(registry);
        let notary = Notary::new(SigningKey::generate(&mut OsRng), registry.clone());
        let key = notary.verifying_key();
        (registry, LocalNotary::new(Arc::new(notary)), key)
    }

    fn request() -> NotarizeRequest {
        let template = RegistryTemplate::new("https://registry.test/VigenciaCedula/consulta", "10.0.0.1").unwrap();
        NotarizeRequest::new(template.request_for(123456789))
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let (registry, notary, key) = setup(FixtureRegistry::deceased().failing_first(2));

        let attested = fetch_attested(&notary, &request(), &key, &fast_retry()).await;
        assert!(attested.is_ok());
        assert_eq!(registry.calls(), 3);
    }

    #[tokio::test]
    async fn test_retries_bounded() {
        let (registry, notary, key) = setup(FixtureRegistry::deceased().failing_first(10));

        let err = fetch_attested(&notary, &request(), &key, &fast_retry()).await.unwrap_err();
        assert!(matches!(err, NotaryError::ConnectionFailed(_)));
        assert_eq!(registry.calls(), 3);
    }

    #[tokio::test]
    async fn test_server_rejection_not_retried() {
        let (registry, notary, key) = setup(FixtureRegistry::raw(404, br#"{"error":"not found"}"#.to_vec()));

        let err = fetch_attested(&notary, &request(), &key, &fast_retry()).await.unwrap_err();
        assert_eq!(err, NotaryError::ServerRejected { status: 404 });
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn test_foreign_notary_key_rejected() {
        let (_, notary, _) = setup(FixtureRegistry::deceased());
        let stranger = SigningKey::generate(&mut OsRng).verifying_key();

        let err = fetch_attested(&notary, &request(), &stranger, &fast_retry()).await.unwrap_err();
        assert!(matches!(err, NotaryError::DisclosureMismatch(_)));
        assert!(!err.is_transient());
    }
}
