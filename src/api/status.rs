//! `GET /api/check-status?nuip=…`: a plain, unattested registry lookup.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::state::AppState;
use crate::commitment::pad_nuip;
use crate::error::{ClaimError, ClaimErrorKind, ClaimStage};
use crate::extractor::{LifeStatus, STATUS_FIELD};
use crate::notary::TransportError;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub nuip: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub found: bool,
    /// As echoed by the registry.
    pub nuip: serde_json::Value,
    pub status: &'static str,
    pub is_alive: bool,
    pub vigencia: String,
}

#[derive(Debug, Deserialize)]
struct RegistryRecord {
    #[serde(default)]
    nuip: serde_json::Value,
    vigencia: Option<String>,
}

pub async fn check_status(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let nuip = query
        .nuip
        .ok_or_else(|| ApiError::Malformed("Missing nuip parameter".to_string()))?;
    pad_nuip(&nuip).map_err(ClaimError::from)?;
    let nuip_value = nuip
        .parse::<u64>()
        .map_err(|e| ClaimError::validation(format!("nuip: {}", e)))?;

    let response = state
        .registry
        .exchange(&state.template.request_for(nuip_value))
        .await
        .map_err(|e| match e {
            TransportError::Request(e) => ClaimError::internal(ClaimStage::Notarizing, e.to_string()),
            other => ClaimError::new(ClaimStage::Notarizing, ClaimErrorKind::ConnectionFailed, other.to_string()),
        })?;

    if response.status == 404 {
        let body = serde_json::json!({ "found": false, "error": "Person not found in registry" });
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    }
    if !(200..300).contains(&response.status) {
        return Err(ClaimError::new(
            ClaimStage::Notarizing,
            ClaimErrorKind::ServerRejected,
            format!("registry returned HTTP {}", response.status),
        )
        .into());
    }

    let record: RegistryRecord = serde_json::from_slice(&response.body).map_err(|e| {
        ClaimError::new(ClaimStage::Extracting, ClaimErrorKind::FieldMissing, e.to_string())
    })?;
    let vigencia = record.vigencia.ok_or_else(|| {
        ClaimError::new(
            ClaimStage::Extracting,
            ClaimErrorKind::FieldMissing,
            format!("registry response has no `{}`", STATUS_FIELD),
        )
    })?;

    let status = LifeStatus::classify(vigencia.as_bytes());
    tracing::debug!(status = status.as_str(), "registry status checked");

    Ok(Json(StatusResponse {
        found: true,
        nuip: record.nuip,
        status: status.as_str(),
        is_alive: status == LifeStatus::Alive,
        vigencia,
    })
    .into_response())
}
