//! [`TranscriptNotary`] backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::attestation::AttestedTranscript;
use super::request::NotarizeRequest;
use super::session::Notary;
use super::{NotaryError, TranscriptNotary};

/// Notary running inside this process.
pub struct LocalNotary {
    notary: Arc<Notary>,
}

impl LocalNotary {
    pub fn new(notary: Arc<Notary>) -> Self {
        Self { notary }
    }
}

#[async_trait]
impl TranscriptNotary for LocalNotary {
    async fn notarize(&self, request: &NotarizeRequest) -> Result<AttestedTranscript, NotaryError> {
        self.notary.notarize(request).await
    }
}

/// Client for a notary served by `proofheir notary`.
pub struct RemoteNotary {
    client: reqwest::Client,
    session_url: String,
}

#[derive(Deserialize)]
struct RemoteErrorBody {
    error: String,
    kind: String,
}

impl RemoteNotary {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NotaryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotaryError::NotaryUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            session_url: format!("{}/notary/session", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TranscriptNotary for RemoteNotary {
    async fn notarize(&self, request: &NotarizeRequest) -> Result<AttestedTranscript, NotaryError> {
        let response = self
            .client
            .post(&self.session_url)
            .json(request)
            .send()
            .await
            .map_err(|e| NotaryError::NotaryUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<AttestedTranscript>()
                .await
                .map_err(|e| NotaryError::DisclosureMismatch(format!("undecodable notary reply: {}", e)));
        }

        let body = response.json::<RemoteErrorBody>().await.ok();
        Err(match body {
            Some(b) if b.kind == "CONNECTION_FAILED" => NotaryError::ConnectionFailed(b.error),
            Some(b) if b.kind == "INVALID_REQUEST" => NotaryError::InvalidRequest(b.error),
            Some(b) => NotaryError::NotaryUnavailable(format!("notary returned {}: {}", status, b.error)),
            None => NotaryError::NotaryUnavailable(format!("notary returned {}", status)),
        })
    }
}
