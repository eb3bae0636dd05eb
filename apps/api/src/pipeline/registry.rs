//! Live runs by id, so an operator can cancel one from a separate request.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new run. The returned guard unregisters it on drop.
    pub fn register(&self, run_id: Uuid) -> RunRegistration {
        let token = CancellationToken::new();
        self.runs.write().insert(run_id, token.clone());
        debug!(%run_id, "Run registered");
        RunRegistration {
            run_id,
            token,
            registry: self.clone(),
        }
    }

    /// Cancels a live run. Returns `false` if no run has this id.
    pub fn cancel(&self, run_id: &Uuid) -> bool {
        match self.runs.read().get(run_id) {
            Some(token) => {
                token.cancel();
                info!(%run_id, "Run cancelled by request");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, run_id: &Uuid) -> bool {
        self.runs.read().contains_key(run_id)
    }

    pub fn active_runs(&self) -> usize {
        self.runs.read().len()
    }

    fn unregister(&self, run_id: &Uuid) {
        if self.runs.write().remove(run_id).is_some() {
            debug!(%run_id, "Run unregistered");
        }
    }
}

/// Membership of one run in the registry.
pub struct RunRegistration {
    run_id: Uuid,
    token: CancellationToken,
    registry: RunRegistry,
}

impl RunRegistration {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RunRegistration {
    fn drop(&mut self) {
        self.registry.unregister(&self.run_id);
    }
}
