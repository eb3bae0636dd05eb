//! Request surface of a pipeline run: the uploaded résumé plus the JSON
//! search configuration, and the validation gating `idle → parsing`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::models::{SalaryRange, WorkPreference};

/// An uploaded résumé file.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Search configuration sent alongside the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    pub target_roles: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub work_preferences: Vec<WorkPreference>,
    #[serde(default)]
    pub salary_range: Option<SalaryRange>,
    #[serde(default)]
    pub exclude_companies: Vec<String>,
    #[serde(default)]
    pub radius: Option<u32>,
    #[serde(default)]
    pub min_fit_score: Option<u8>,
    #[serde(default)]
    pub cover_letter_template: Option<String>,
}

/// Raw request as received; nothing is trusted yet.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub document: Option<ResumeDocument>,
    pub config_json: Option<String>,
    /// The upload ran past the size limit and was not read to the end.
    pub oversized: bool,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub document: ResumeDocument,
    pub config: SearchConfig,
}

impl PipelineRequest {
    pub fn validate(self, max_document_bytes: usize) -> Result<ValidatedRequest, PipelineError> {
        if self.oversized {
            return Err(PipelineError::validation(format!(
                "The upload exceeds the {max_document_bytes} byte limit for resume documents"
            )));
        }
        let document = self
            .document
            .ok_or_else(|| PipelineError::validation("A resume document is required"))?;

        if document.bytes.is_empty() {
            return Err(PipelineError::validation("The resume document is empty"));
        }
        if document.bytes.len() > max_document_bytes {
            return Err(PipelineError::validation(format!(
                "The resume document is {} bytes; the limit is {} bytes",
                document.bytes.len(),
                max_document_bytes
            )));
        }

        let raw = self
            .config_json
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PipelineError::validation("A search configuration is required"))?;
        let mut config: SearchConfig = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::validation(format!("Invalid search configuration: {e}")))?;

        config.target_roles = config
            .target_roles
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if config.target_roles.is_empty() {
            return Err(PipelineError::validation(
                "At least one target role is required",
            ));
        }

        if let Some(score) = config.min_fit_score {
            if score > 100 {
                return Err(PipelineError::validation(format!(
                    "minFitScore must be between 0 and 100, got {score}"
                )));
            }
        }

        if let Some(SalaryRange {
            min: Some(min),
            max: Some(max),
            ..
        }) = &config.salary_range
        {
            if min > max {
                return Err(PipelineError::validation(format!(
                    "salaryRange.min ({min}) exceeds salaryRange.max ({max})"
                )));
            }
        }

        Ok(ValidatedRequest { document, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const LIMIT: usize = 5 * 1024 * 1024;

    fn doc(bytes: &'static [u8]) -> Option<ResumeDocument> {
        Some(ResumeDocument {
            file_name: Some("resume.txt".to_string()),
            content_type: Some("text/plain".to_string()),
            bytes: Bytes::from_static(bytes),
        })
    }

    fn request(document: Option<ResumeDocument>, config: &str) -> PipelineRequest {
        PipelineRequest {
            document,
            config_json: Some(config.to_string()),
            oversized: false,
        }
    }

    #[test]
    fn test_valid_request_trims_roles() {
        let validated = request(
            doc(b"Jane Doe, ML engineer"),
            r#"{"targetRoles": ["  ML Engineer ", ""], "minFitScore": 70}"#,
        )
        .validate(LIMIT)
        .unwrap();
        assert_eq!(validated.config.target_roles, vec!["ML Engineer"]);
        assert_eq!(validated.config.min_fit_score, Some(70));
        assert!(validated.config.exclude_companies.is_empty());
    }

    #[test]
    fn test_missing_document_rejected() {
        let err = request(None, r#"{"targetRoles": ["x"]}"#)
            .validate(LIMIT)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
        assert!(!err.recoverable);
    }

    #[test]
    fn test_empty_document_rejected() {
        let err = request(doc(b""), r#"{"targetRoles": ["x"]}"#)
            .validate(LIMIT)
            .unwrap_err();
        assert!(err.message.contains("empty"));
    }

    #[test]
    fn test_oversized_document_rejected() {
        let err = request(doc(b"0123456789"), r#"{"targetRoles": ["x"]}"#)
            .validate(8)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_upload_cut_at_limit_rejected() {
        let mut req = request(doc(b"resume"), r#"{"targetRoles": ["x"]}"#);
        req.oversized = true;
        let err = req.validate(LIMIT).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
        assert!(!err.recoverable);
        assert!(err.message.contains("limit"));

        let err = PipelineRequest {
            oversized: true,
            ..PipelineRequest::default()
        }
        .validate(LIMIT)
        .unwrap_err();
        assert!(err.message.contains("limit"));
    }

    #[test]
    fn test_empty_target_roles_rejected() {
        let err = request(doc(b"resume"), r#"{"targetRoles": ["   "]}"#)
            .validate(LIMIT)
            .unwrap_err();
        assert!(err.message.contains("target role"));
    }

    #[test]
    fn test_malformed_config_rejected() {
        let err = request(doc(b"resume"), "{not json")
            .validate(LIMIT)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_inverted_salary_range_rejected() {
        let err = request(
            doc(b"resume"),
            r#"{"targetRoles": ["x"], "salaryRange": {"min": 200000, "max": 100000}}"#,
        )
        .validate(LIMIT)
        .unwrap_err();
        assert!(err.message.contains("salaryRange"));
    }
}
