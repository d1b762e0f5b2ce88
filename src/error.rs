//! Claim pipeline errors.
//!
//! Every stage error keeps the stage it came from and a [`ClaimErrorKind`]
//! that callers can act on (retry, fix input, give up).

use serde::Serialize;
use std::fmt;

use crate::commitment::CommitmentError;
use crate::extractor::ExtractionError;
use crate::notary::NotaryError;
use crate::prover::ProverError;
use crate::verifier::VerifierError;

/// Pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStage {
    Idle,
    Validating,
    Notarizing,
    Extracting,
    Proving,
    Encoding,
    Done,
}

impl ClaimStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Notarizing => "notarizing",
            Self::Extracting => "extracting",
            Self::Proving => "proving",
            Self::Encoding => "encoding",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ClaimStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimErrorKind {
    Validation,
    ConnectionFailed,
    NotaryUnavailable,
    ServerRejected,
    FieldMissing,
    IdentityMismatch,
    WitnessUnsatisfiable,
    ProvingTimeout,
    InternalProverError,
    DisclosureMismatch,
}

impl ClaimErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::NotaryUnavailable => "NOTARY_UNAVAILABLE",
            Self::ServerRejected => "SERVER_REJECTED",
            Self::FieldMissing => "FIELD_MISSING",
            Self::IdentityMismatch => "IDENTITY_MISMATCH",
            Self::WitnessUnsatisfiable => "WITNESS_UNSATISFIABLE",
            Self::ProvingTimeout => "PROVING_TIMEOUT",
            Self::InternalProverError => "INTERNAL_PROVER_ERROR",
            Self::DisclosureMismatch => "DISCLOSURE_MISMATCH",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed | Self::NotaryUnavailable | Self::ProvingTimeout
        )
    }
}

impl fmt::Display for ClaimErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed ({kind}): {message}")]
pub struct ClaimError {
    pub stage: ClaimStage,
    pub kind: ClaimErrorKind,
    pub message: String,
}

impl ClaimError {
    pub fn new(stage: ClaimStage, kind: ClaimErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ClaimStage::Validating, ClaimErrorKind::Validation, message)
    }

    pub fn internal(stage: ClaimStage, message: impl Into<String>) -> Self {
        Self::new(stage, ClaimErrorKind::InternalProverError, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<CommitmentError> for ClaimError {
    fn from(err: CommitmentError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<NotaryError> for ClaimError {
    fn from(err: NotaryError) -> Self {
        let kind = match &err {
            NotaryError::ConnectionFailed(_) => ClaimErrorKind::ConnectionFailed,
            NotaryError::NotaryUnavailable(_) => ClaimErrorKind::NotaryUnavailable,
            NotaryError::ServerRejected { .. } => ClaimErrorKind::ServerRejected,
            NotaryError::DisclosureMismatch(_) | NotaryError::InvalidRequest(_) => {
                ClaimErrorKind::DisclosureMismatch
            }
        };
        Self::new(ClaimStage::Notarizing, kind, err.to_string())
    }
}

impl From<ExtractionError> for ClaimError {
    fn from(err: ExtractionError) -> Self {
        let kind = match &err {
            ExtractionError::MalformedBody(_) | ExtractionError::FieldMissing(_) => {
                ClaimErrorKind::FieldMissing
            }
            ExtractionError::IdentityMismatch { .. } => ClaimErrorKind::IdentityMismatch,
            ExtractionError::Unattested(_) => ClaimErrorKind::DisclosureMismatch,
        };
        Self::new(ClaimStage::Extracting, kind, err.to_string())
    }
}

impl From<ProverError> for ClaimError {
    fn from(err: ProverError) -> Self {
        let kind = match &err {
            ProverError::WitnessUnsatisfiable(_) => ClaimErrorKind::WitnessUnsatisfiable,
            _ => ClaimErrorKind::InternalProverError,
        };
        Self::new(ClaimStage::Proving, kind, err.to_string())
    }
}

impl From<VerifierError> for ClaimError {
    fn from(err: VerifierError) -> Self {
        Self::internal(ClaimStage::Proving, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        let retryable: Vec<_> = [
            ClaimErrorKind::Validation,
            ClaimErrorKind::ConnectionFailed,
            ClaimErrorKind::NotaryUnavailable,
            ClaimErrorKind::ServerRejected,
            ClaimErrorKind::FieldMissing,
            ClaimErrorKind::IdentityMismatch,
            ClaimErrorKind::WitnessUnsatisfiable,
            ClaimErrorKind::ProvingTimeout,
            ClaimErrorKind::InternalProverError,
            ClaimErrorKind::DisclosureMismatch,
        ]
        .into_iter()
        .filter(ClaimErrorKind::is_retryable)
        .collect();

        assert_eq!(
            retryable,
            [
                ClaimErrorKind::ConnectionFailed,
                ClaimErrorKind::NotaryUnavailable,
                ClaimErrorKind::ProvingTimeout
            ]
        );
    }

    #[test]
    fn notary_errors_keep_their_kind() {
        let err = ClaimError::from(NotaryError::ServerRejected { status: 503 });
        assert_eq!(err.stage, ClaimStage::Notarizing);
        assert_eq!(err.kind, ClaimErrorKind::ServerRejected);

        let err = ClaimError::from(NotaryError::ConnectionFailed("reset".into()));
        assert!(err.is_retryable());
    }

    #[test]
    fn extraction_errors_keep_their_kind() {
        let err = ClaimError::from(ExtractionError::IdentityMismatch { expected: 1, found: 2 });
        assert_eq!(err.stage, ClaimStage::Extracting);
        assert_eq!(err.kind, ClaimErrorKind::IdentityMismatch);

        let err = ClaimError::from(ExtractionError::Unattested("x".into()));
        assert_eq!(err.kind, ClaimErrorKind::DisclosureMismatch);
    }

    #[test]
    fn prover_errors_keep_their_kind() {
        let err = ClaimError::from(ProverError::WitnessUnsatisfiable("alive".into()));
        assert_eq!(err.kind, ClaimErrorKind::WitnessUnsatisfiable);

        let err = ClaimError::from(ProverError::SetupFailed("x".into()));
        assert_eq!(err.kind, ClaimErrorKind::InternalProverError);
    }

    #[test]
    fn display_names_stage_and_kind() {
        let err = ClaimError::validation("nuip must contain only decimal digits");
        assert_eq!(
            err.to_string(),
            "validating failed (VALIDATION): nuip must contain only decimal digits"
        );
    }
}
