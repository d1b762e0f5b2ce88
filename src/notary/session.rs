//! The notary party: runs the registry exchange and signs what it saw.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;

use super::attestation::{
    plaintext_hash, Attestation, AttestationBody, AttestedTranscript, PlaintextHash,
    PlaintextHashSecret, RevealedRange, ATTESTATION_VERSION, BLINDER_LEN,
};
use super::json::top_level_fields;
use super::request::{NotarizeRequest, RegistryRequest, RequestError};
use super::transcript::{parse_response, render_response, Direction, Transcript};
use super::NotaryError;

/// Raw registry reply as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryResponse {
    pub status: u16,
    pub reason: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("could not reach registry: {0}")]
    Connect(String),

    #[error("registry exchange timed out")]
    Timeout,

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Performs the actual exchange with the registry.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn exchange(&self, request: &RegistryRequest) -> Result<RegistryResponse, TransportError>;
}

/// HTTPS transport over reqwest with rustls.
pub struct HttpsTransport {
    client: reqwest::Client,
}

impl HttpsTransport {
    pub fn new(connect_timeout: Duration, exchange_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(exchange_timeout)
            .https_only(true)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RegistryTransport for HttpsTransport {
    async fn exchange(&self, request: &RegistryRequest) -> Result<RegistryResponse, TransportError> {
        let (url, _) = request.target()?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::CONNECTION, "close")
            .body(request.body())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(classify)?;

        Ok(RegistryResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            content_type,
            body: body.to_vec(),
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect(err.to_string())
    }
}

/// A proxy notary holding the signing key.
pub struct Notary {
    signing_key: SigningKey,
    transport: Arc<dyn RegistryTransport>,
    allowed_hosts: Vec<String>,
}

impl Notary {
    pub fn new(signing_key: SigningKey, transport: Arc<dyn RegistryTransport>) -> Self {
        Self {
            signing_key,
            transport,
            allowed_hosts: Vec::new(),
        }
    }

    /// Restrict which registry hosts this notary will contact. Empty means any.
    pub fn with_allowed_hosts(mut self, hosts: Vec<String>) -> Self {
        self.allowed_hosts = hosts;
        self
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Run one exchange and attest it under `request.disclosure`.
    pub async fn notarize(&self, request: &NotarizeRequest) -> Result<AttestedTranscript, NotaryError> {
        let (_, server_name) = request.request.target().map_err(invalid_request)?;
        if !self.allowed_hosts.is_empty() && !self.allowed_hosts.iter().any(|h| h == &server_name) {
            return Err(invalid_request(RequestError::HostNotAllowed(server_name)));
        }

        let sent = request.request.render().map_err(invalid_request)?;
        let response = self
            .transport
            .exchange(&request.request)
            .await
            .map_err(|e| match e {
                TransportError::Request(e) => invalid_request(e),
                other => NotaryError::ConnectionFailed(other.to_string()),
            })?;

        let received = render_response(
            response.status,
            &response.reason,
            response.content_type.as_deref(),
            &response.body,
        );
        let transcript = Transcript::new(sent, received);

        let mut revealed = Vec::new();
        let mut commitments = Vec::new();
        let mut secrets = Vec::new();

        // A body that is not a JSON object discloses nothing; the
        // extractor fails closed on it later.
        let view = parse_response(transcript.received())
            .map_err(|e| NotaryError::DisclosureMismatch(e.to_string()))?;
        let body = &transcript.received()[view.body.start..view.body.end];
        for field in top_level_fields(body).unwrap_or_default() {
            let range = field.content().offset(view.body.start);
            if request.disclosure.reveal.contains(&field.key) {
                revealed.push(RevealedRange { direction: Direction::Received, range });
            }
            if request.disclosure.commit.contains(&field.key) {
                let mut blinder = [0u8; BLINDER_LEN];
                rand::thread_rng().fill_bytes(&mut blinder);
                let plaintext = &transcript.received()[range.start..range.end];
                commitments.push(PlaintextHash {
                    direction: Direction::Received,
                    range,
                    hash: plaintext_hash(plaintext, &blinder),
                });
                secrets.push(PlaintextHashSecret { direction: Direction::Received, range, blinder });
            }
        }

        let body = AttestationBody {
            version: ATTESTATION_VERSION,
            server_name: server_name.clone(),
            transcript_digest: transcript.digest(),
            revealed,
            commitments,
            notarized_at: Utc::now(),
        };
        let attestation = Attestation::sign(body, &self.signing_key)
            .map_err(|e| NotaryError::NotaryUnavailable(e.to_string()))?;

        tracing::info!(
            server = %server_name,
            status = view.status,
            revealed = attestation.body.revealed.len(),
            committed = attestation.body.commitments.len(),
            "transcript notarized"
        );

        Ok(AttestedTranscript { transcript, attestation, secrets })
    }
}

fn invalid_request(err: RequestError) -> NotaryError {
    NotaryError::InvalidRequest(err.to_string())
}
