//! `GET /api/verifying-key`.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::error::ApiError;
use super::state::AppState;
use crate::error::{ClaimError, ClaimStage};
use crate::public_inputs::{PUBLIC_INPUT_COUNT, PUBLIC_INPUT_LAYOUT_VERSION};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyingKeyResponse {
    pub layout_version: u8,
    pub public_input_count: usize,
    /// Compressed arkworks encoding, hex.
    pub verifying_key: String,
}

pub async fn verifying_key(State(state): State<AppState>) -> Result<Json<VerifyingKeyResponse>, ApiError> {
    let verifying_key = state
        .pipeline
        .verifier()
        .verifying_key_hex()
        .map_err(|e| ClaimError::internal(ClaimStage::Encoding, e.to_string()))?;

    Ok(Json(VerifyingKeyResponse {
        layout_version: PUBLIC_INPUT_LAYOUT_VERSION,
        public_input_count: PUBLIC_INPUT_COUNT,
        verifying_key,
    }))
}
