//! Shared state for the route handlers.

use std::sync::Arc;

use crate::notary::{Notary, RegistryTemplate, RegistryTransport};
use crate::pipeline::ClaimPipeline;

/// State of the prover service. Cheap to clone; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ClaimPipeline>,
    /// Direct registry access for the plain status lookup.
    pub registry: Arc<dyn RegistryTransport>,
    pub template: RegistryTemplate,
}

impl AppState {
    pub fn new(
        pipeline: Arc<ClaimPipeline>,
        registry: Arc<dyn RegistryTransport>,
        template: RegistryTemplate,
    ) -> Self {
        Self {
            pipeline,
            registry,
            template,
        }
    }
}

/// State of the notary role.
#[derive(Clone)]
pub struct NotaryState {
    pub notary: Arc<Notary>,
}
