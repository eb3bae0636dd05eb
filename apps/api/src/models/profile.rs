use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeniorityLevel {
    Junior,
    Mid,
    Senior,
    Staff,
    Principal,
    Executive,
}

impl SeniorityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SeniorityLevel::Junior => "junior",
            SeniorityLevel::Mid => "mid",
            SeniorityLevel::Senior => "senior",
            SeniorityLevel::Staff => "staff",
            SeniorityLevel::Principal => "principal",
            SeniorityLevel::Executive => "executive",
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            SeniorityLevel::Junior => 0,
            SeniorityLevel::Mid => 1,
            SeniorityLevel::Senior => 2,
            SeniorityLevel::Staff => 3,
            SeniorityLevel::Principal => 4,
            SeniorityLevel::Executive => 5,
        }
    }

    /// Best-effort seniority guess from a job title.
    pub fn from_title(title: &str) -> Option<Self> {
        let title = title.to_lowercase();
        let level = if title.contains("principal") || title.contains("distinguished") {
            SeniorityLevel::Principal
        } else if title.contains("staff") || title.contains("lead") {
            SeniorityLevel::Staff
        } else if title.contains("senior") || title.contains("sr.") || title.contains("sr ") {
            SeniorityLevel::Senior
        } else if title.contains("junior")
            || title.contains("jr.")
            || title.contains("entry")
            || title.contains("intern")
        {
            SeniorityLevel::Junior
        } else if title.contains("director") || title.contains("vp ") || title.contains("head of") {
            SeniorityLevel::Executive
        } else {
            return None;
        };
        Some(level)
    }
}

/// Format the résumé text was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Text,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryEntry {
    pub company: String,
    pub title: String,
    #[serde(default)]
    pub start_date: Option<String>,
    /// `None` means current role.
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub institution: String,
    pub degree: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    pub extracted_at: DateTime<Utc>,
    /// 0.0 – 1.0
    pub confidence: f32,
    pub warnings: Vec<String>,
    pub source_format: SourceFormat,
}

/// Candidate profile extracted once in the parsing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub skills: Vec<String>,
    pub years_of_experience: f32,
    pub tech_stack: Vec<String>,
    pub job_history: Vec<JobHistoryEntry>,
    pub education: Vec<Education>,
    pub seniority_level: SeniorityLevel,
    pub trajectory: String,
    pub metadata: ProfileMetadata,
}
