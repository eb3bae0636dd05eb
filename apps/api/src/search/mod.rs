//! Job search: the boundary to the job-listing provider, plus the
//! aggregation rules applied to its results.

pub mod dedup;
pub mod jsearch;

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::models::{JobOpportunity, WorkPreference};
use crate::pipeline::request::SearchConfig;

/// One provider query, issued per target role.
#[derive(Debug, Clone, PartialEq)]
pub struct JobQuery {
    pub query: String,
    pub location_hint: Option<String>,
    pub work_preference: Option<WorkPreference>,
    pub radius: Option<u32>,
}

impl JobQuery {
    /// The first configured location and work preference act as hints.
    pub fn for_role(role: &str, config: &SearchConfig) -> Self {
        Self {
            query: role.to_string(),
            location_hint: config
                .locations
                .iter()
                .map(|l| l.trim())
                .find(|l| !l.is_empty())
                .map(String::from),
            work_preference: config.work_preferences.first().copied(),
            radius: config.radius,
        }
    }
}

/// Fails with `AUTH_FAILED` (non-recoverable), `RATE_LIMITED` (recoverable)
/// or `UPSTREAM_ERROR` (recoverable on 5xx).
#[async_trait]
pub trait JobSearchClient: Send + Sync {
    async fn search_jobs(&self, query: &JobQuery) -> Result<Vec<JobOpportunity>, PipelineError>;
}
