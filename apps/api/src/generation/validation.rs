//! Schema checks for model output. Anything that parses but violates the
//! contract is reported as `MALFORMED_OUTPUT`, which the retry policy treats
//! as worth another attempt.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, PipelineError};
use crate::llm_client::strip_json_fences;
use crate::models::{
    CandidateProfile, CoverLetterDraft, Education, FitAnalysis, FitBreakdown, JobHistoryEntry,
    ProfileMetadata, SeniorityLevel, SourceFormat,
};

const DEFAULT_PROFILE_CONFIDENCE: f32 = 0.7;
const MIN_LETTER_WORDS: usize = 40;

fn malformed(message: impl Into<String>) -> PipelineError {
    PipelineError::new(ErrorKind::MalformedOutput, message)
}

/// Parses raw model text (fences allowed) into a contract type.
pub fn parse_contract<T: DeserializeOwned>(raw: &str) -> Result<T, PipelineError> {
    let text = strip_json_fences(raw);
    if text.is_empty() {
        return Err(malformed("Model returned empty content"));
    }
    serde_json::from_str(text).map_err(|e| malformed(format!("Model output is not valid JSON: {e}")))
}

fn check_unit_interval(name: &str, value: f32) -> Result<(), PipelineError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(malformed(format!("{name} must be between 0 and 1, got {value}")));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Profile contract
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileContract {
    pub skills: Vec<String>,
    pub years_of_experience: f32,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub job_history: Vec<JobHistoryEntry>,
    #[serde(default)]
    pub education: Vec<Education>,
    pub seniority_level: SeniorityLevel,
    #[serde(default)]
    pub trajectory: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ProfileContract {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.skills.iter().all(|s| s.trim().is_empty()) {
            return Err(malformed("Profile has no skills"));
        }
        if !self.years_of_experience.is_finite() || self.years_of_experience < 0.0 {
            return Err(malformed(format!(
                "yearsOfExperience must be a non-negative number, got {}",
                self.years_of_experience
            )));
        }
        if let Some(confidence) = self.confidence {
            check_unit_interval("confidence", confidence)?;
        }
        Ok(())
    }

    /// Attaches extraction metadata and produces the immutable profile.
    pub fn into_profile(self, source_format: SourceFormat) -> CandidateProfile {
        let clean = |items: Vec<String>| -> Vec<String> {
            items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        CandidateProfile {
            skills: clean(self.skills),
            years_of_experience: self.years_of_experience,
            tech_stack: clean(self.tech_stack),
            job_history: self.job_history,
            education: self.education,
            seniority_level: self.seniority_level,
            trajectory: self.trajectory,
            metadata: ProfileMetadata {
                extracted_at: Utc::now(),
                confidence: self.confidence.unwrap_or(DEFAULT_PROFILE_CONFIDENCE),
                warnings: self.warnings,
                source_format,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fit analysis contract
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitContract {
    pub breakdown: FitBreakdown,
    pub confidence: f32,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
}

impl FitContract {
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, sub) in self.breakdown.sub_scores() {
            if sub.score > 100 {
                return Err(malformed(format!(
                    "{name} sub-score must be 0-100, got {}",
                    sub.score
                )));
            }
        }
        check_unit_interval("confidence", self.confidence)
    }

    /// Overall score is always the weighted sum of the sub-scores.
    pub fn into_analysis(self, job_id: &str) -> FitAnalysis {
        FitAnalysis {
            job_id: job_id.to_string(),
            overall_score: self.breakdown.weighted_score(),
            breakdown: self.breakdown,
            confidence: self.confidence,
            summary: self.summary,
            concerns: self.concerns,
            strengths: self.strengths,
            analyzed_at: Utc::now(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cover letter contract
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterContract {
    pub content: String,
    #[serde(default)]
    pub highlighted_experiences: Vec<String>,
    #[serde(default)]
    pub customizations: Vec<String>,
}

impl LetterContract {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let words = self.content.split_whitespace().count();
        if words < MIN_LETTER_WORDS {
            return Err(malformed(format!(
                "Cover letter has {words} words; at least {MIN_LETTER_WORDS} expected"
            )));
        }
        Ok(())
    }

    pub fn into_draft(self, job_id: &str) -> CoverLetterDraft {
        CoverLetterDraft {
            job_id: job_id.to_string(),
            content: self.content.trim().to_string(),
            highlighted_experiences: self.highlighted_experiences,
            customizations: self.customizations,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_JSON: &str = r#"{
        "skills": ["Python", " ", "Machine Learning"],
        "yearsOfExperience": 5,
        "techStack": ["PyTorch"],
        "seniorityLevel": "senior",
        "trajectory": "Backend to ML"
    }"#;

    #[test]
    fn test_profile_contract_accepts_fenced_output() {
        let raw = format!("```json\n{PROFILE_JSON}\n```");
        let contract: ProfileContract = parse_contract(&raw).unwrap();
        contract.validate().unwrap();
        let profile = contract.into_profile(SourceFormat::Pdf);
        assert_eq!(profile.skills, vec!["Python", "Machine Learning"]);
        assert_eq!(profile.metadata.confidence, DEFAULT_PROFILE_CONFIDENCE);
        assert_eq!(profile.metadata.source_format, SourceFormat::Pdf);
    }

    #[test]
    fn test_truncated_json_is_malformed_output() {
        let err = parse_contract::<ProfileContract>(r#"{"skills": ["Py"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
        assert!(err.recoverable);
    }

    #[test]
    fn test_unknown_seniority_is_malformed_output() {
        let raw = PROFILE_JSON.replace("\"senior\"", "\"wizard\"");
        let err = parse_contract::<ProfileContract>(&raw).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
    }

    #[test]
    fn test_negative_experience_rejected() {
        let raw = PROFILE_JSON.replace("\"yearsOfExperience\": 5", "\"yearsOfExperience\": -2");
        let contract: ProfileContract = parse_contract(&raw).unwrap();
        assert_eq!(contract.validate().unwrap_err().kind, ErrorKind::MalformedOutput);
    }

    #[test]
    fn test_fit_contract_derives_overall_score() {
        let raw = r#"{
            "breakdown": {
                "skills": {"score": 100, "rationale": ""},
                "experience": {"score": 80, "rationale": ""},
                "techStack": {"score": 60, "rationale": ""},
                "seniority": {"score": 40, "rationale": ""}
            },
            "confidence": 0.9
        }"#;
        let contract: FitContract = parse_contract(raw).unwrap();
        contract.validate().unwrap();
        let analysis = contract.into_analysis("job-1");
        assert_eq!(analysis.overall_score, 76);
        assert_eq!(analysis.job_id, "job-1");
    }

    #[test]
    fn test_fit_contract_rejects_out_of_range_sub_score() {
        let raw = r#"{
            "breakdown": {
                "skills": {"score": 140, "rationale": ""},
                "experience": {"score": 80, "rationale": ""},
                "techStack": {"score": 60, "rationale": ""},
                "seniority": {"score": 40, "rationale": ""}
            },
            "confidence": 0.9
        }"#;
        let contract: FitContract = parse_contract(raw).unwrap();
        assert!(contract.validate().is_err());
    }

    #[test]
    fn test_short_letter_rejected() {
        let contract = LetterContract {
            content: "Hire me.".to_string(),
            highlighted_experiences: vec![],
            customizations: vec![],
        };
        assert_eq!(contract.validate().unwrap_err().kind, ErrorKind::MalformedOutput);
    }
}
