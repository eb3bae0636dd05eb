use std::sync::Arc;

use crate::pipeline::{Orchestrator, RunRegistry};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Live runs, for the cancel endpoint.
    pub registry: RunRegistry,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            registry: RunRegistry::new(),
        }
    }
}
