//! `POST /api/generate-proof`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::error::ApiError;
use super::state::AppState;
use crate::chain::ChainProof;
use crate::pipeline::ClaimRequest;

pub async fn generate_proof(
    State(state): State<AppState>,
    body: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<Json<ChainProof>, ApiError> {
    let Json(request) = body?;
    let proof = state.pipeline.run(&request).await?;
    Ok(Json(proof))
}
