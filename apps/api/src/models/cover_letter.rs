use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generated cover letter for one qualifying job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetterDraft {
    pub job_id: String,
    pub content: String,
    pub highlighted_experiences: Vec<String>,
    pub customizations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl CoverLetterDraft {
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}
