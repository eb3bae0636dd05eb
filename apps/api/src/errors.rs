use std::collections::BTreeMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::events::ErrorPayload;
use crate::pipeline::phase::Phase;
use crate::retry::Classify;

// ────────────────────────────────────────────────────────────────────────────
// Pipeline error taxonomy
// ────────────────────────────────────────────────────────────────────────────

/// Every failure the pipeline can report, stage-level and collaborator-native.
///
/// Stage-level kinds are what the client sees in `error` events. Collaborator
/// kinds (`INVALID_INPUT`, `AUTH_FAILED`, `MALFORMED_OUTPUT`, ...) are produced
/// at the external boundaries and either surface as-is or get reclassified by
/// the stage that caught them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ParseFailed,
    InvalidPdf,
    EmptyContent,
    SearchFailed,
    RateLimited,
    AnalysisFailed,
    GenerationFailed,
    ExportFailed,
    Timeout,
    ValidationFailed,
    Unknown,
    InvalidInput,
    Unreadable,
    AuthFailed,
    UpstreamError,
    MalformedOutput,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ParseFailed => "PARSE_FAILED",
            ErrorKind::InvalidPdf => "INVALID_PDF",
            ErrorKind::EmptyContent => "EMPTY_CONTENT",
            ErrorKind::SearchFailed => "SEARCH_FAILED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::AnalysisFailed => "ANALYSIS_FAILED",
            ErrorKind::GenerationFailed => "GENERATION_FAILED",
            ErrorKind::ExportFailed => "EXPORT_FAILED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ValidationFailed => "VALIDATION_FAILED",
            ErrorKind::Unknown => "UNKNOWN",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Unreadable => "UNREADABLE",
            ErrorKind::AuthFailed => "AUTH_FAILED",
            ErrorKind::UpstreamError => "UPSTREAM_ERROR",
            ErrorKind::MalformedOutput => "MALFORMED_OUTPUT",
        }
    }

    pub fn default_recoverable(self) -> bool {
        match self {
            ErrorKind::ParseFailed
            | ErrorKind::InvalidPdf
            | ErrorKind::EmptyContent
            | ErrorKind::ValidationFailed
            | ErrorKind::Unknown
            | ErrorKind::InvalidInput
            | ErrorKind::Unreadable
            | ErrorKind::AuthFailed => false,
            ErrorKind::SearchFailed
            | ErrorKind::RateLimited
            | ErrorKind::AnalysisFailed
            | ErrorKind::GenerationFailed
            | ErrorKind::ExportFailed
            | ErrorKind::Timeout
            | ErrorKind::UpstreamError
            | ErrorKind::MalformedOutput => true,
        }
    }

    /// The phase a kind normally originates from. `None` means "any phase";
    /// export happens outside the streaming pipeline, so it has none either.
    pub fn default_phase(self) -> Option<Phase> {
        match self {
            ErrorKind::ParseFailed
            | ErrorKind::InvalidPdf
            | ErrorKind::EmptyContent
            | ErrorKind::InvalidInput
            | ErrorKind::Unreadable => Some(Phase::Parsing),
            ErrorKind::SearchFailed | ErrorKind::RateLimited | ErrorKind::AuthFailed => {
                Some(Phase::Searching)
            }
            ErrorKind::AnalysisFailed => Some(Phase::Analyzing),
            ErrorKind::GenerationFailed => Some(Phase::Generating),
            ErrorKind::ValidationFailed => Some(Phase::Idle),
            // Export runs outside the streamed state machine.
            ErrorKind::ExportFailed
            | ErrorKind::Timeout
            | ErrorKind::Unknown
            | ErrorKind::UpstreamError
            | ErrorKind::MalformedOutput => None,
        }
    }

    /// Kinds raised by the resume extractor itself; these surface unchanged
    /// from the parsing stage instead of collapsing into `PARSE_FAILED`.
    pub fn is_extraction_native(self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidPdf
                | ErrorKind::EmptyContent
                | ErrorKind::InvalidInput
                | ErrorKind::Unreadable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The uniform error value every stage and collaborator reports.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub message: String,
    pub phase: Option<Phase>,
    pub recoverable: bool,
    /// HTTP-like status of the upstream response, when there was one.
    pub status: Option<u16>,
    pub context: BTreeMap<String, String>,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            phase: kind.default_phase(),
            recoverable: kind.default_recoverable(),
            status: None,
            context: BTreeMap::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Re-labels a caught failure with a stage-level kind. The message,
    /// status and recoverability of the original failure are kept; the
    /// original code is preserved under the `cause` context key.
    pub fn reclassify(mut self, kind: ErrorKind, phase: Phase) -> Self {
        if self.kind != kind {
            self.context
                .insert("cause".to_string(), self.kind.code().to_string());
        }
        self.kind = kind;
        self.phase = Some(phase);
        self
    }

    /// Builds the wire payload. `active` fills in the phase when the error
    /// itself does not name one.
    pub fn to_payload(&self, active: Phase) -> ErrorPayload {
        ErrorPayload {
            message: self.message.clone(),
            code: self.kind,
            phase: self.phase.unwrap_or(active),
            recoverable: self.recoverable,
        }
    }
}

impl Classify for PipelineError {
    fn code(&self) -> &str {
        self.kind.code()
    }

    fn status(&self) -> Option<u16> {
        self.status
    }

    fn message(&self) -> &str {
        &self.message
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP-level errors
// ────────────────────────────────────────────────────────────────────────────

/// Errors returned before an event stream is opened.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_defaults_match_table() {
        let table = [
            (ErrorKind::ParseFailed, false, Some(Phase::Parsing)),
            (ErrorKind::InvalidPdf, false, Some(Phase::Parsing)),
            (ErrorKind::EmptyContent, false, Some(Phase::Parsing)),
            (ErrorKind::SearchFailed, true, Some(Phase::Searching)),
            (ErrorKind::RateLimited, true, Some(Phase::Searching)),
            (ErrorKind::AnalysisFailed, true, Some(Phase::Analyzing)),
            (ErrorKind::GenerationFailed, true, Some(Phase::Generating)),
            (ErrorKind::Timeout, true, None),
            (ErrorKind::ValidationFailed, false, Some(Phase::Idle)),
            (ErrorKind::Unknown, false, None),
            (ErrorKind::ExportFailed, true, None),
        ];
        for (kind, recoverable, phase) in table {
            assert_eq!(kind.default_recoverable(), recoverable, "{kind}");
            assert_eq!(kind.default_phase(), phase, "{kind}");
        }
    }

    #[test]
    fn test_kind_serializes_as_wire_code() {
        for kind in [
            ErrorKind::MalformedOutput,
            ErrorKind::ValidationFailed,
            ErrorKind::AuthFailed,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.code()));
        }
    }

    #[test]
    fn test_reclassify_keeps_recoverability_and_records_cause() {
        let err = PipelineError::new(ErrorKind::MalformedOutput, "bad json")
            .reclassify(ErrorKind::ParseFailed, Phase::Parsing);
        assert_eq!(err.kind, ErrorKind::ParseFailed);
        assert!(err.recoverable);
        assert_eq!(err.phase, Some(Phase::Parsing));
        assert_eq!(err.context.get("cause").map(String::as_str), Some("MALFORMED_OUTPUT"));
    }

    #[test]
    fn test_payload_falls_back_to_active_phase() {
        let payload = PipelineError::unknown("boom").to_payload(Phase::Analyzing);
        assert_eq!(payload.phase, Phase::Analyzing);
        assert_eq!(payload.code, ErrorKind::Unknown);
        assert!(!payload.recoverable);
    }

    #[test]
    fn test_extraction_native_kinds() {
        assert!(ErrorKind::Unreadable.is_extraction_native());
        assert!(ErrorKind::EmptyContent.is_extraction_native());
        assert!(!ErrorKind::MalformedOutput.is_extraction_native());
    }
}
