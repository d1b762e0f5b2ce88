//! Notary role: `POST /notary/session`, `GET /notary/public-key`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::error::NotaryApiError;
use super::state::NotaryState;
use crate::notary::{AttestedTranscript, NotarizeRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

pub async fn session(
    State(state): State<NotaryState>,
    body: Result<Json<NotarizeRequest>, JsonRejection>,
) -> Result<Json<AttestedTranscript>, NotaryApiError> {
    let Json(request) = body?;
    let attested = state.notary.notarize(&request).await?;
    Ok(Json(attested))
}

pub async fn public_key(State(state): State<NotaryState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key: hex::encode(state.notary.verifying_key().to_bytes()),
    })
}
