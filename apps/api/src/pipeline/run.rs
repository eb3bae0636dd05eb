use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::{CandidateProfile, CoverLetterDraft, FitAnalysis, JobOpportunity};
use crate::pipeline::events::{CompletionSummary, SkippedItem};
use crate::pipeline::phase::Phase;
use crate::pipeline::progress::ProgressTracker;

/// Jobs scoring at or above this count as high fit in the summary.
pub const HIGH_FIT_SCORE: u8 = 80;
/// Lower bound of the medium-fit band `[60, 80)`.
pub const MEDIUM_FIT_SCORE: u8 = 60;

/// State of one client request. Owned by a single orchestrator task for the
/// lifetime of the stream.
#[derive(Debug)]
pub struct PipelineRun {
    pub id: Uuid,
    phase: Phase,
    pub progress: ProgressTracker,
    started_at: Instant,
    pub profile: Option<CandidateProfile>,
    pub jobs: Vec<JobOpportunity>,
    pub analyses: HashMap<String, FitAnalysis>,
    pub cover_letters: HashMap<String, CoverLetterDraft>,
    pub skipped: Vec<SkippedItem>,
    pub error: Option<PipelineError>,
}

impl PipelineRun {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            phase: Phase::Idle,
            progress: ProgressTracker::new(),
            started_at: Instant::now(),
            profile: None,
            jobs: Vec::new(),
            analyses: HashMap::new(),
            cover_letters: HashMap::new(),
            skipped: Vec::new(),
            error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Moves the state machine forward. Backward moves and moves out of a
    /// terminal phase are rejected.
    pub fn advance(&mut self, next: Phase) -> Result<(), PipelineError> {
        if !self.phase.can_advance_to(next) {
            return Err(PipelineError::unknown(format!(
                "Illegal phase transition {} -> {}",
                self.phase, next
            ))
            .with_phase(self.phase));
        }
        debug!(run_id = %self.id, "Phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    pub fn record_analysis(&mut self, analysis: FitAnalysis) -> bool {
        if self.analyses.contains_key(&analysis.job_id) {
            warn!(run_id = %self.id, "Duplicate analysis for job {} ignored", analysis.job_id);
            return false;
        }
        self.analyses.insert(analysis.job_id.clone(), analysis);
        true
    }

    pub fn record_cover_letter(&mut self, letter: CoverLetterDraft) -> bool {
        if self.cover_letters.contains_key(&letter.job_id) {
            warn!(run_id = %self.id, "Duplicate cover letter for job {} ignored", letter.job_id);
            return false;
        }
        self.cover_letters.insert(letter.job_id.clone(), letter);
        true
    }

    pub fn skip(&mut self, stage: Phase, target: impl Into<String>, err: &PipelineError) {
        self.skipped.push(SkippedItem {
            stage,
            target: target.into(),
            code: err.kind,
            message: err.message.clone(),
        });
    }

    /// Jobs whose analysis passes `threshold`, in listing order.
    pub fn qualifying_jobs(&self, threshold: u8) -> Vec<JobOpportunity> {
        self.jobs
            .iter()
            .filter(|job| {
                self.analyses
                    .get(&job.id)
                    .is_some_and(|a| a.overall_score >= threshold)
            })
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> CompletionSummary {
        let high_fit_jobs = self
            .analyses
            .values()
            .filter(|a| a.overall_score >= HIGH_FIT_SCORE)
            .count();
        let medium_fit_jobs = self
            .analyses
            .values()
            .filter(|a| (MEDIUM_FIT_SCORE..HIGH_FIT_SCORE).contains(&a.overall_score))
            .count();

        CompletionSummary {
            total_jobs: self.jobs.len(),
            analyzed_jobs: self.analyses.len(),
            high_fit_jobs,
            medium_fit_jobs,
            cover_letters_generated: self.cover_letters.len(),
            duration_ms: self.started_at.elapsed().as_millis() as u64,
            skipped: self.skipped.clone(),
        }
    }

    pub fn fail(&mut self, err: PipelineError) {
        if let Err(e) = self.advance(Phase::Error) {
            debug!(run_id = %self.id, "Error recorded in terminal phase: {e}");
        }
        self.error = Some(err);
    }

    pub fn cancel(&mut self) {
        if self.advance(Phase::Cancelled).is_err() {
            debug!(run_id = %self.id, "Cancel ignored in terminal phase {}", self.phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::models::{FitBreakdown, SubScore};
    use chrono::Utc;

    fn analysis(job_id: &str, score: u8) -> FitAnalysis {
        let sub = SubScore {
            score,
            matched: vec![],
            missing: vec![],
            rationale: String::new(),
        };
        FitAnalysis {
            job_id: job_id.to_string(),
            overall_score: score,
            breakdown: FitBreakdown {
                skills: sub.clone(),
                experience: sub.clone(),
                tech_stack: sub.clone(),
                seniority: sub,
            },
            confidence: 0.8,
            summary: String::new(),
            concerns: vec![],
            strengths: vec![],
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn test_advance_rejects_backward_move() {
        let mut run = PipelineRun::new(Uuid::new_v4());
        run.advance(Phase::Parsing).unwrap();
        run.advance(Phase::Searching).unwrap();
        let err = run.advance(Phase::Parsing).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(run.phase(), Phase::Searching);
    }

    #[test]
    fn test_summary_fit_bands() {
        let mut run = PipelineRun::new(Uuid::new_v4());
        for (id, score) in [("a", 90), ("b", 65), ("c", 40), ("d", 80), ("e", 60)] {
            assert!(run.record_analysis(analysis(id, score)));
        }
        let summary = run.summary();
        assert_eq!(summary.analyzed_jobs, 5);
        assert_eq!(summary.high_fit_jobs, 2);
        assert_eq!(summary.medium_fit_jobs, 2);
    }

    #[test]
    fn test_at_most_one_analysis_per_job() {
        let mut run = PipelineRun::new(Uuid::new_v4());
        assert!(run.record_analysis(analysis("a", 90)));
        assert!(!run.record_analysis(analysis("a", 10)));
        assert_eq!(run.analyses["a"].overall_score, 90);
    }

    #[test]
    fn test_fail_moves_to_error_and_keeps_error() {
        let mut run = PipelineRun::new(Uuid::new_v4());
        run.advance(Phase::Parsing).unwrap();
        run.fail(PipelineError::new(ErrorKind::ParseFailed, "bad"));
        assert_eq!(run.phase(), Phase::Error);
        assert_eq!(run.error.as_ref().map(|e| e.kind), Some(ErrorKind::ParseFailed));
    }
}
