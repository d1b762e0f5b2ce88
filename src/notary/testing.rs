//! In-memory registry for tests. Built only under `cfg(test)` or the
//! `testing` feature.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::request::RegistryRequest;
use super::session::{RegistryResponse, RegistryTransport, TransportError};

pub const DECEASED: &str = "No Vigente (Fallecido)";
pub const ALIVE: &str = "Vigente (Vivo)";

enum Reply {
    Record { vigencia: String, echo: Option<u64> },
    Raw { status: u16, body: Vec<u8> },
    Unreachable,
}

/// A registry that answers from a fixed script and counts its calls.
pub struct FixtureRegistry {
    reply: Reply,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl FixtureRegistry {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            failures_left: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Echoes the requested NUIP with a deceased status.
    pub fn deceased() -> Self {
        Self::with_status(DECEASED)
    }

    /// Echoes the requested NUIP with an alive status.
    pub fn alive() -> Self {
        Self::with_status(ALIVE)
    }

    pub fn with_status(vigencia: &str) -> Self {
        Self::with_reply(Reply::Record {
            vigencia: vigencia.to_string(),
            echo: None,
        })
    }

    /// Always echoes `nuip`, whatever was asked.
    pub fn echoing(nuip: u64, vigencia: &str) -> Self {
        Self::with_reply(Reply::Record {
            vigencia: vigencia.to_string(),
            echo: Some(nuip),
        })
    }

    pub fn raw(status: u16, body: Vec<u8>) -> Self {
        Self::with_reply(Reply::Raw { status, body })
    }

    pub fn unreachable() -> Self {
        Self::with_reply(Reply::Unreachable)
    }

    /// Fail the first `n` exchanges with a connection error.
    pub fn failing_first(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryTransport for FixtureRegistry {
    async fn exchange(&self, request: &RegistryRequest) -> Result<RegistryResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Connect("connection reset by fixture".to_string()));
        }

        let (status, body) = match &self.reply {
            Reply::Record { vigencia, echo } => {
                let body = serde_json::json!({
                    "nuip": echo.unwrap_or(request.nuip),
                    "vigencia": vigencia,
                });
                (200, body.to_string().into_bytes())
            }
            Reply::Raw { status, body } => (*status, body.clone()),
            Reply::Unreachable => {
                return Err(TransportError::Connect("connection refused".to_string()))
            }
        };

        Ok(RegistryResponse {
            status,
            reason: if status == 200 { "OK" } else { "Error" }.to_string(),
            content_type: Some("application/json".to_string()),
            body,
        })
    }
}
