//! The event union streamed to the client, and its JSON payloads.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;
use crate::models::{CandidateProfile, CoverLetterDraft, FitAnalysis, JobOpportunity};
use crate::pipeline::phase::Phase;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseUpdate {
    pub phase: Phase,
    /// Overall progress, 0 – 100.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub code: ErrorKind,
    pub phase: Phase,
    pub recoverable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

/// An item dropped by a stage's log-and-skip policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedItem {
    pub stage: Phase,
    /// Target role for searches, job id for analyses and letters.
    pub target: String,
    pub code: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub total_jobs: usize,
    pub analyzed_jobs: usize,
    pub high_fit_jobs: usize,
    pub medium_fit_jobs: usize,
    pub cover_letters_generated: usize,
    pub duration_ms: u64,
    #[serde(default)]
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Phase(PhaseUpdate),
    Profile(CandidateProfile),
    Job(JobOpportunity),
    Analysis(FitAnalysis),
    CoverLetter(CoverLetterDraft),
    Complete(CompletionSummary),
    Error(ErrorPayload),
    Heartbeat(Heartbeat),
}

impl PipelineEvent {
    pub fn phase(phase: Phase, progress: u8, message: impl Into<String>) -> Self {
        PipelineEvent::Phase(PhaseUpdate {
            phase,
            progress,
            message: Some(message.into()),
        })
    }

    pub fn heartbeat_now() -> Self {
        PipelineEvent::Heartbeat(Heartbeat {
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// The event-type label used on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineEvent::Phase(_) => "phase",
            PipelineEvent::Profile(_) => "profile",
            PipelineEvent::Job(_) => "job",
            PipelineEvent::Analysis(_) => "analysis",
            PipelineEvent::CoverLetter(_) => "coverLetter",
            PipelineEvent::Complete(_) => "complete",
            PipelineEvent::Error(_) => "error",
            PipelineEvent::Heartbeat(_) => "heartbeat",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Complete(_) | PipelineEvent::Error(_))
    }

    /// Labels whose payloads a client must not silently drop.
    pub fn is_critical_label(label: &str) -> bool {
        matches!(label, "complete" | "error")
    }

    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            PipelineEvent::Phase(p) => serde_json::to_string(p),
            PipelineEvent::Profile(p) => serde_json::to_string(p),
            PipelineEvent::Job(j) => serde_json::to_string(j),
            PipelineEvent::Analysis(a) => serde_json::to_string(a),
            PipelineEvent::CoverLetter(c) => serde_json::to_string(c),
            PipelineEvent::Complete(s) => serde_json::to_string(s),
            PipelineEvent::Error(e) => serde_json::to_string(e),
            PipelineEvent::Heartbeat(h) => serde_json::to_string(h),
        }
    }

    /// Decodes a labelled payload. Unknown labels yield `Ok(None)`.
    pub fn decode(label: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match label {
            "phase" => PipelineEvent::Phase(serde_json::from_str(data)?),
            "profile" => PipelineEvent::Profile(serde_json::from_str(data)?),
            "job" => PipelineEvent::Job(serde_json::from_str(data)?),
            "analysis" => PipelineEvent::Analysis(serde_json::from_str(data)?),
            "coverLetter" => PipelineEvent::CoverLetter(serde_json::from_str(data)?),
            "complete" => PipelineEvent::Complete(serde_json::from_str(data)?),
            "error" => PipelineEvent::Error(serde_json::from_str(data)?),
            "heartbeat" => PipelineEvent::Heartbeat(serde_json::from_str(data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
