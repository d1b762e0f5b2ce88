//! HTTP error replies.
//!
//! Claim failures render as `{ error, kind, stage, retryable }`. Retryable
//! kinds that map to 503 carry `Retry-After`. Internal failures are logged
//! and returned with a fixed message.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, ClaimErrorKind, ClaimStage};
use crate::notary::NotaryError;

/// Seconds a client should wait before retrying a 503.
pub const RETRY_AFTER_SECS: u64 = 5;

const REDACTED: &str = "internal error while producing the claim proof";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
    pub stage: String,
    pub retryable: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("malformed request: {0}")]
    Malformed(String),
}

impl ApiError {
    fn claim(&self) -> Option<&ClaimError> {
        match self {
            Self::Claim(err) => Some(err),
            Self::Malformed(_) => None,
        }
    }

    fn kind(&self) -> ClaimErrorKind {
        self.claim().map_or(ClaimErrorKind::Validation, |err| err.kind)
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ClaimErrorKind::Validation => StatusCode::BAD_REQUEST,
            ClaimErrorKind::FieldMissing
            | ClaimErrorKind::IdentityMismatch
            | ClaimErrorKind::WitnessUnsatisfiable => StatusCode::UNPROCESSABLE_ENTITY,
            ClaimErrorKind::ConnectionFailed | ClaimErrorKind::ServerRejected => StatusCode::BAD_GATEWAY,
            ClaimErrorKind::NotaryUnavailable | ClaimErrorKind::ProvingTimeout => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ClaimErrorKind::DisclosureMismatch | ClaimErrorKind::InternalProverError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "claim failed with an internal error");
            REDACTED.to_string()
        } else {
            match &self {
                Self::Claim(err) => err.message.clone(),
                Self::Malformed(msg) => msg.clone(),
            }
        };

        let stage = self.claim().map_or(ClaimStage::Validating, |err| err.stage);

        let body = ErrorBody {
            error: message,
            kind: kind.code().to_string(),
            stage: stage.as_str().to_string(),
            retryable: kind.is_retryable(),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

/// Error replies of the notary role: `{ error, kind }`.
#[derive(Debug)]
pub struct NotaryApiError(pub NotaryError);

impl From<NotaryError> for NotaryApiError {
    fn from(err: NotaryError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for NotaryApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(NotaryError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for NotaryApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            NotaryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            NotaryError::ConnectionFailed(_) | NotaryError::ServerRejected { .. } => StatusCode::BAD_GATEWAY,
            NotaryError::NotaryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            NotaryError::DisclosureMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(kind = self.0.code(), error = %self.0, "notarization refused");

        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(kind: ClaimErrorKind) -> StatusCode {
        ApiError::Claim(ClaimError::new(ClaimStage::Proving, kind, "x")).status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(ClaimErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ClaimErrorKind::FieldMissing), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(ClaimErrorKind::IdentityMismatch), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(ClaimErrorKind::WitnessUnsatisfiable), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(ClaimErrorKind::ConnectionFailed), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(ClaimErrorKind::ServerRejected), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(ClaimErrorKind::NotaryUnavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(ClaimErrorKind::ProvingTimeout), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(ClaimErrorKind::DisclosureMismatch), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(ClaimErrorKind::InternalProverError), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::Malformed("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_retry_after_on_unavailable() {
        let response = ApiError::Claim(ClaimError::new(
            ClaimStage::Proving,
            ClaimErrorKind::ProvingTimeout,
            "slow",
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");

        let response = ApiError::Claim(ClaimError::validation("bad")).into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_notary_status_mapping() {
        let response = NotaryApiError(NotaryError::ConnectionFailed("reset".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = NotaryApiError(NotaryError::InvalidRequest("host".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
