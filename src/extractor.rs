//! Claim facts read out of an attested registry transcript.
//!
//! Only bytes the notary vouched for are used: the echoed NUIP must sit in a
//! revealed range and the status must be exactly a committed range whose
//! opening the prover holds. The transcript is assumed to have passed
//! [`AttestedTranscript::verify`] already.

use std::fmt;

use crate::notary::attestation::{AttestedTranscript, BLINDER_LEN};
use crate::notary::json::{top_level_fields, JsonField, JsonKind};
use crate::notary::transcript::{parse_response, ByteRange, Direction};

pub const ID_FIELD: &str = "nuip";
pub const STATUS_FIELD: &str = "vigencia";

/// Registry status strings.
pub const STATUS_ALIVE: &[u8] = b"Vigente (Vivo)";
pub const STATUS_DECEASED: &[u8] = b"No Vigente (Fallecido)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeStatus {
    Alive,
    Deceased,
    Unrecognized,
}

impl LifeStatus {
    pub fn classify(status: &[u8]) -> Self {
        match status {
            STATUS_ALIVE => Self::Alive,
            STATUS_DECEASED => Self::Deceased,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Deceased => "deceased",
            Self::Unrecognized => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("registry response is not a JSON object: {0}")]
    MalformedBody(String),

    #[error("registry response field `{0}` is missing or has the wrong type")]
    FieldMissing(String),

    #[error("registry answered for a different identity (expected {expected}, got {found})")]
    IdentityMismatch { expected: u64, found: u64 },

    #[error("unattested plaintext: {0}")]
    Unattested(String),
}

/// Notary-backed facts about one registry record.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimFact {
    pub status: LifeStatus,
    pub status_bytes: Vec<u8>,
    pub status_commitment: [u8; 32],
    pub status_blinder: [u8; BLINDER_LEN],
    pub echoed_nuip: u64,
    pub server_name: String,
}

impl fmt::Debug for ClaimFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimFact")
            .field("status", &self.status)
            .field("status_commitment", &hex::encode(self.status_commitment))
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

/// Parse a registry id given either as a JSON number or a digit string.
fn parse_id(raw: &[u8]) -> Option<u64> {
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(raw).ok()?.parse().ok()
}

fn field<'a>(fields: &'a [JsonField], key: &str) -> Option<&'a JsonField> {
    fields.iter().find(|f| f.key == key)
}

pub fn extract(attested: &AttestedTranscript, expected_nuip: u64) -> Result<ClaimFact, ExtractionError> {
    let received = attested.transcript.received();
    let view = parse_response(received).map_err(|e| ExtractionError::MalformedBody(e.to_string()))?;
    let body = &received[view.body.start..view.body.end];
    let fields = top_level_fields(body).map_err(|e| ExtractionError::MalformedBody(e.to_string()))?;
    let absolute = |range: ByteRange| range.offset(view.body.start);

    let id = field(&fields, ID_FIELD)
        .filter(|f| matches!(f.kind, JsonKind::Number | JsonKind::String))
        .ok_or_else(|| ExtractionError::FieldMissing(ID_FIELD.to_string()))?;
    let id_range = absolute(id.content());
    let echoed_nuip = parse_id(&received[id_range.start..id_range.end])
        .ok_or_else(|| ExtractionError::FieldMissing(ID_FIELD.to_string()))?;

    let status = field(&fields, STATUS_FIELD)
        .filter(|f| f.kind == JsonKind::String)
        .ok_or_else(|| ExtractionError::FieldMissing(STATUS_FIELD.to_string()))?;
    let status_range = absolute(status.content());

    if !attested.is_revealed(Direction::Received, &id_range) {
        return Err(ExtractionError::Unattested(format!("`{}` was not revealed by the notary", ID_FIELD)));
    }
    let commitment = attested
        .commitment(Direction::Received, &status_range)
        .ok_or_else(|| ExtractionError::Unattested(format!("`{}` is not committed", STATUS_FIELD)))?;
    let secret = attested
        .secret(Direction::Received, &status_range)
        .ok_or_else(|| ExtractionError::Unattested(format!("no opening for `{}`", STATUS_FIELD)))?;

    if echoed_nuip != expected_nuip {
        return Err(ExtractionError::IdentityMismatch {
            expected: expected_nuip,
            found: echoed_nuip,
        });
    }

    let status_bytes = received[status_range.start..status_range.end].to_vec();
    Ok(ClaimFact {
        status: LifeStatus::classify(&status_bytes),
        status_bytes,
        status_commitment: commitment.hash,
        status_blinder: secret.blinder,
        echoed_nuip,
        server_name: attested.server_name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notary::attestation::plaintext_hash;
    use crate::notary::testing::FixtureRegistry;
    use crate::notary::{DisclosurePolicy, NotarizeRequest, Notary, RegistryTemplate};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use std::sync::Arc;

    const NUIP: u64 = 123456789;

    async fn attest_with(registry: FixtureRegistry, disclosure: DisclosurePolicy) -> AttestedTranscript {
        let notary = Notary::new(SigningKey::generate(&mut OsRng), Arc::new(registry));
        let template = RegistryTemplate::new("https://registry.test/VigenciaCedula/consulta", "10.0.0.1").unwrap();
        let request = NotarizeRequest {
            request: template.request_for(NUIP),
            disclosure,
        };
        notary.notarize(&request).await.unwrap()
    }

    async fn attest(registry: FixtureRegistry) -> AttestedTranscript {
        attest_with(registry, DisclosurePolicy::default()).await
    }

    #[tokio::test]
    async fn test_deceased_fact() {
        let fact = extract(&attest(FixtureRegistry::deceased()).await, NUIP).unwrap();

        assert_eq!(fact.status, LifeStatus::Deceased);
        assert_eq!(fact.status_bytes, STATUS_DECEASED);
        assert_eq!(fact.echoed_nuip, NUIP);
        assert_eq!(fact.server_name, "registry.test");
        assert_eq!(
            plaintext_hash(&fact.status_bytes, &fact.status_blinder),
            fact.status_commitment
        );
    }

    #[tokio::test]
    async fn test_alive_and_unrecognized() {
        let alive = extract(&attest(FixtureRegistry::alive()).await, NUIP).unwrap();
        assert_eq!(alive.status, LifeStatus::Alive);

        let other = extract(&attest(FixtureRegistry::with_status("Cancelada")).await, NUIP).unwrap();
        assert_eq!(other.status, LifeStatus::Unrecognized);
    }

    #[tokio::test]
    async fn test_echo_mismatch() {
        let attested = attest(FixtureRegistry::echoing(987654321, "No Vigente (Fallecido)")).await;
        assert_eq!(
            extract(&attested, NUIP),
            Err(ExtractionError::IdentityMismatch { expected: NUIP, found: 987654321 })
        );
    }

    #[tokio::test]
    async fn test_id_as_digit_string_accepted() {
        let body = br#"{"nuip":"123456789","vigencia":"No Vigente (Fallecido)"}"#.to_vec();
        let fact = extract(&attest(FixtureRegistry::raw(200, body)).await, NUIP).unwrap();
        assert_eq!(fact.echoed_nuip, NUIP);
    }

    #[tokio::test]
    async fn test_missing_or_mistyped_fields() {
        let no_status = attest(FixtureRegistry::raw(200, br#"{"nuip":123456789}"#.to_vec())).await;
        assert_eq!(extract(&no_status, NUIP), Err(ExtractionError::FieldMissing("vigencia".into())));

        let numeric_status = attest(FixtureRegistry::raw(200, br#"{"nuip":123456789,"vigencia":1}"#.to_vec())).await;
        assert_eq!(extract(&numeric_status, NUIP), Err(ExtractionError::FieldMissing("vigencia".into())));

        let no_id = attest(FixtureRegistry::raw(200, br#"{"vigencia":"Vigente (Vivo)"}"#.to_vec())).await;
        assert_eq!(extract(&no_id, NUIP), Err(ExtractionError::FieldMissing("nuip".into())));

        let bad_id = attest(FixtureRegistry::raw(200, br#"{"nuip":"12a","vigencia":"x"}"#.to_vec())).await;
        assert_eq!(extract(&bad_id, NUIP), Err(ExtractionError::FieldMissing("nuip".into())));
    }

    #[tokio::test]
    async fn test_non_object_body_fails_closed() {
        let attested = attest(FixtureRegistry::raw(200, b"<html></html>".to_vec())).await;
        assert!(matches!(extract(&attested, NUIP), Err(ExtractionError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn test_status_must_be_committed() {
        let revealed_only = DisclosurePolicy {
            reveal: vec!["nuip".into(), "vigencia".into()],
            commit: vec![],
        };
        let attested = attest_with(FixtureRegistry::deceased(), revealed_only).await;
        assert!(matches!(extract(&attested, NUIP), Err(ExtractionError::Unattested(_))));
    }

    #[tokio::test]
    async fn test_id_must_be_revealed() {
        let hidden_id = DisclosurePolicy {
            reveal: vec![],
            commit: vec!["vigencia".into()],
        };
        let attested = attest_with(FixtureRegistry::deceased(), hidden_id).await;
        assert!(matches!(extract(&attested, NUIP), Err(ExtractionError::Unattested(_))));
    }

    #[tokio::test]
    async fn test_missing_opening_rejected() {
        let mut attested = attest(FixtureRegistry::deceased()).await;
        attested.secrets.clear();
        assert!(matches!(extract(&attested, NUIP), Err(ExtractionError::Unattested(_))));
    }
}
