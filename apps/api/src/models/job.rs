use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Remote,
    Hybrid,
    Onsite,
    Unknown,
}

/// A candidate's accepted work arrangement, as sent in the search config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkPreference {
    Remote,
    Hybrid,
    Onsite,
}

impl WorkPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkPreference::Remote => "remote",
            WorkPreference::Hybrid => "hybrid",
            WorkPreference::Onsite => "onsite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Jsearch,
    Linkedin,
    Indeed,
    Glassdoor,
    Other,
}

impl JobSource {
    /// Maps a provider's publisher label onto a known source.
    pub fn from_publisher(publisher: &str) -> Self {
        let publisher = publisher.to_lowercase();
        if publisher.contains("linkedin") {
            JobSource::Linkedin
        } else if publisher.contains("indeed") {
            JobSource::Indeed
        } else if publisher.contains("glassdoor") {
            JobSource::Glassdoor
        } else if publisher.is_empty() {
            JobSource::Jsearch
        } else {
            JobSource::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryRange {
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Normalized job listing. Created during the searching stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOpportunity {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub remote_status: RemoteStatus,
    pub description: String,
    pub requirements: Vec<String>,
    pub tech_stack: Vec<String>,
    pub application_url: Option<String>,
    pub source: JobSource,
    pub posted_date: Option<DateTime<Utc>>,
    pub salary_range: Option<SalaryRange>,
    pub retrieved_at: DateTime<Utc>,
}

impl JobOpportunity {
    /// Identity used for deduplication: lower-cased (company, title).
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.company.trim().to_lowercase(),
            self.title.trim().to_lowercase(),
        )
    }
}
