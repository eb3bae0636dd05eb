//! Drives one pipeline run: validate → parse → search → analyze → generate
//! → complete, streaming events through a [`StreamTransport`].
//!
//! State is single-owner: the run lives on the orchestrator's task and is
//! only touched between awaits, so nothing here takes a lock. Per-item
//! failures (one role search, one analysis, one letter) are logged, noted in
//! the summary's `skipped` list and otherwise ignored. Stage-fatal failures
//! end the run with exactly one `error` event.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::errors::{ErrorKind, PipelineError};
use crate::extract::ResumeExtractor;
use crate::generation::{FitAnalyzer, LetterGenerator, ProfileExtractor};
use crate::models::{CandidateProfile, CoverLetterDraft, FitAnalysis, JobOpportunity};
use crate::pipeline::events::PipelineEvent;
use crate::pipeline::phase::Phase;
use crate::pipeline::progress::{phase_range, PhaseRange, SEARCH_EMIT, SEARCH_ROLES};
use crate::pipeline::request::{PipelineRequest, ValidatedRequest};
use crate::pipeline::run::PipelineRun;
use crate::retry::{self, RetryHooks};
use crate::search::{dedup, JobQuery, JobSearchClient};
use crate::stream::StreamTransport;

/// The external boundaries a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn ResumeExtractor>,
    pub profiles: Arc<dyn ProfileExtractor>,
    pub search: Arc<dyn JobSearchClient>,
    pub analyzer: Arc<dyn FitAnalyzer>,
    pub letters: Arc<dyn LetterGenerator>,
}

pub struct Orchestrator {
    settings: PipelineSettings,
    collaborators: Collaborators,
}

impl Orchestrator {
    pub fn new(settings: PipelineSettings, collaborators: Collaborators) -> Self {
        Self {
            settings,
            collaborators,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs the pipeline to a terminal state. The transport is always
    /// closed before this returns.
    pub async fn run(&self, request: PipelineRequest, mut transport: StreamTransport) -> PipelineRun {
        let mut run = PipelineRun::new(transport.run_id());
        transport.start_heartbeat(self.settings.heartbeat_interval);
        info!(run_id = %run.id, "Pipeline run started");

        let outcome = {
            let work = AssertUnwindSafe(self.drive(&mut run, request, &transport)).catch_unwind();
            match self.settings.timeout {
                Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                    Ok(Err(PipelineError::new(
                        ErrorKind::Timeout,
                        format!("Pipeline exceeded its {}s time budget", limit.as_secs()),
                    )))
                }),
                None => work.await,
            }
        };
        let outcome = outcome.unwrap_or_else(|panic| {
            Err(PipelineError::unknown(format!(
                "Unexpected failure: {}",
                panic_message(panic.as_ref())
            )))
        });

        match outcome {
            Ok(()) => {}
            Err(_) if transport.is_cancelled() => {
                debug!(run_id = %run.id, "Failure after cancellation discarded");
                run.cancel();
            }
            Err(err) => {
                let payload = err.to_payload(run.phase());
                error!(
                    run_id = %run.id,
                    code = %payload.code,
                    phase = %payload.phase,
                    recoverable = payload.recoverable,
                    "Pipeline failed: {}",
                    payload.message
                );
                transport.emit(PipelineEvent::Error(payload));
                run.fail(err);
            }
        }

        transport.close();
        info!(
            run_id = %run.id,
            phase = %run.phase(),
            elapsed_ms = run.summary().duration_ms,
            "Pipeline run finished"
        );
        run
    }

    async fn drive(
        &self,
        run: &mut PipelineRun,
        request: PipelineRequest,
        transport: &StreamTransport,
    ) -> Result<(), PipelineError> {
        let request = request.validate(self.settings.max_resume_bytes)?;

        let Some(profile) = self.parse_stage(run, &request, transport).await? else {
            return Ok(());
        };
        if !self.search_stage(run, &request, transport).await? {
            return Ok(());
        }
        if run.jobs.is_empty() {
            info!(run_id = %run.id, "No jobs found, completing early");
            return self.complete(run, transport);
        }
        if !self.analysis_stage(run, &profile, transport).await? {
            return Ok(());
        }

        let threshold = request
            .config
            .min_fit_score
            .unwrap_or(self.settings.default_min_fit_score);
        let template = request.config.cover_letter_template.as_deref();
        if !self
            .generation_stage(run, &profile, threshold, template, transport)
            .await?
        {
            return Ok(());
        }

        self.complete(run, transport)
    }

    // ────────────────────────────────────────────────────────────────────
    // Stages
    // ────────────────────────────────────────────────────────────────────

    async fn parse_stage(
        &self,
        run: &mut PipelineRun,
        request: &ValidatedRequest,
        transport: &StreamTransport,
    ) -> Result<Option<CandidateProfile>, PipelineError> {
        if stop_if_cancelled(run, transport) {
            return Ok(None);
        }
        self.enter(run, transport, Phase::Parsing, "Reading resume")?;
        let range = phase_range(Phase::Parsing);

        let extracted = self
            .collaborators
            .extractor
            .extract_text(&request.document)
            .await
            .map_err(parse_failure)?;
        debug!(
            run_id = %run.id,
            chars = extracted.text.len(),
            pages = extracted.page_count,
            "Resume text extracted"
        );
        emit_progress(run, transport, Phase::Parsing, range, 1, 3, "Extracting candidate profile");

        if stop_if_cancelled(run, transport) {
            return Ok(None);
        }
        let hooks = retry_hooks(run.id, Phase::Parsing, "profile");
        let contract = retry::execute(
            &self.settings.retry.parsing,
            transport.cancel_token(),
            &hooks,
            || self.collaborators.profiles.extract_profile(&extracted.text),
        )
        .await
        .map_err(parse_failure)?;

        let mut profile = contract.into_profile(extracted.format);
        if extracted.page_count > 3 {
            profile.metadata.warnings.push(format!(
                "Resume is {} pages; only the most relevant content may have been used",
                extracted.page_count
            ));
        }
        if stop_if_cancelled(run, transport) {
            return Ok(None);
        }

        run.profile = Some(profile.clone());
        transport.emit(PipelineEvent::Profile(profile.clone()));
        emit_progress(run, transport, Phase::Parsing, range, 3, 3, "Profile extracted");
        Ok(Some(profile))
    }

    /// Returns `false` if the run was cancelled.
    async fn search_stage(
        &self,
        run: &mut PipelineRun,
        request: &ValidatedRequest,
        transport: &StreamTransport,
    ) -> Result<bool, PipelineError> {
        if stop_if_cancelled(run, transport) {
            return Ok(false);
        }
        let config = &request.config;
        let roles = &config.target_roles;
        self.enter(
            run,
            transport,
            Phase::Searching,
            &format!("Searching jobs for {} role(s)", roles.len()),
        )?;

        let mut found = Vec::new();
        for (i, role) in roles.iter().enumerate() {
            if stop_if_cancelled(run, transport) {
                return Ok(false);
            }
            let query = JobQuery::for_role(role, config);
            let hooks = retry_hooks(run.id, Phase::Searching, role);
            let result = retry::execute(
                &self.settings.retry.searching,
                transport.cancel_token(),
                &hooks,
                || self.collaborators.search.search_jobs(&query),
            )
            .await;

            match result {
                Ok(jobs) => {
                    debug!(run_id = %run.id, role = %role, count = jobs.len(), "Role search finished");
                    found.extend(jobs);
                }
                Err(err) => {
                    let err = stage_failure(err, ErrorKind::SearchFailed, Phase::Searching);
                    warn!(run_id = %run.id, role = %role, code = %err.kind, "Role search skipped: {}", err.message);
                    run.skip(Phase::Searching, role.clone(), &err);
                }
            }
            emit_progress(
                run,
                transport,
                Phase::Searching,
                SEARCH_ROLES,
                i + 1,
                roles.len(),
                &format!("Searched {}/{} roles", i + 1, roles.len()),
            );
        }
        if stop_if_cancelled(run, transport) {
            return Ok(false);
        }

        let raw_count = found.len();
        let jobs = dedup::aggregate(found, &config.exclude_companies, config.salary_range.as_ref());
        info!(
            run_id = %run.id,
            found = raw_count,
            kept = jobs.len(),
            "Search results aggregated"
        );

        let total = jobs.len();
        for (i, job) in jobs.iter().enumerate() {
            transport.emit(PipelineEvent::Job(job.clone()));
            emit_progress(
                run,
                transport,
                Phase::Searching,
                SEARCH_EMIT,
                i + 1,
                total,
                &format!("Found {}/{} jobs", i + 1, total),
            );
        }
        run.jobs = jobs;
        Ok(true)
    }

    /// Returns `false` if the run was cancelled.
    async fn analysis_stage(
        &self,
        run: &mut PipelineRun,
        profile: &CandidateProfile,
        transport: &StreamTransport,
    ) -> Result<bool, PipelineError> {
        if stop_if_cancelled(run, transport) {
            return Ok(false);
        }
        let jobs = run.jobs.clone();
        let total = jobs.len();
        self.enter(run, transport, Phase::Analyzing, &format!("Analyzing {total} jobs"))?;
        let range = phase_range(Phase::Analyzing);

        let run_id = run.id;
        let mut done = 0;
        for batch in jobs.chunks(self.settings.analysis_batch_size.max(1)) {
            if stop_if_cancelled(run, transport) {
                return Ok(false);
            }
            let results = join_all(
                batch
                    .iter()
                    .map(|job| self.analyze_job(run_id, profile, job, transport.cancel_token())),
            )
            .await;
            if stop_if_cancelled(run, transport) {
                return Ok(false);
            }

            for (job, result) in batch.iter().zip(results) {
                match result {
                    Ok(analysis) => {
                        if run.record_analysis(analysis.clone()) {
                            transport.emit(PipelineEvent::Analysis(analysis));
                        }
                    }
                    Err(err) => {
                        warn!(run_id = %run.id, job_id = %job.id, code = %err.kind, "Analysis skipped: {}", err.message);
                        run.skip(Phase::Analyzing, job.id.clone(), &err);
                    }
                }
            }
            done += batch.len();
            emit_progress(
                run,
                transport,
                Phase::Analyzing,
                range,
                done,
                total,
                &format!("Analyzed {done}/{total} jobs"),
            );
        }
        Ok(true)
    }

    /// Returns `false` if the run was cancelled.
    async fn generation_stage(
        &self,
        run: &mut PipelineRun,
        profile: &CandidateProfile,
        threshold: u8,
        template: Option<&str>,
        transport: &StreamTransport,
    ) -> Result<bool, PipelineError> {
        if stop_if_cancelled(run, transport) {
            return Ok(false);
        }
        let targets: Vec<(JobOpportunity, FitAnalysis)> = run
            .qualifying_jobs(threshold)
            .into_iter()
            .filter_map(|job| {
                let analysis = run.analyses.get(&job.id)?.clone();
                Some((job, analysis))
            })
            .collect();
        let total = targets.len();
        self.enter(
            run,
            transport,
            Phase::Generating,
            &format!("Drafting {total} cover letter(s) for jobs scoring {threshold}+"),
        )?;
        let range = phase_range(Phase::Generating);

        if targets.is_empty() {
            emit_progress(run, transport, Phase::Generating, range, 0, 0, "No jobs met the fit threshold");
            return Ok(true);
        }

        let run_id = run.id;
        let mut done = 0;
        for batch in targets.chunks(self.settings.analysis_batch_size.max(1)) {
            if stop_if_cancelled(run, transport) {
                return Ok(false);
            }
            let results = join_all(batch.iter().map(|(job, analysis)| {
                self.draft_letter(run_id, profile, job, analysis, template, transport.cancel_token())
            }))
            .await;
            if stop_if_cancelled(run, transport) {
                return Ok(false);
            }

            for ((job, _), result) in batch.iter().zip(results) {
                match result {
                    Ok(letter) => {
                        if run.record_cover_letter(letter.clone()) {
                            transport.emit(PipelineEvent::CoverLetter(letter));
                        }
                    }
                    Err(err) => {
                        warn!(run_id = %run.id, job_id = %job.id, code = %err.kind, "Cover letter skipped: {}", err.message);
                        run.skip(Phase::Generating, job.id.clone(), &err);
                    }
                }
            }
            done += batch.len();
            emit_progress(
                run,
                transport,
                Phase::Generating,
                range,
                done,
                total,
                &format!("Drafted {done}/{total} cover letters"),
            );
        }
        Ok(true)
    }

    fn complete(&self, run: &mut PipelineRun, transport: &StreamTransport) -> Result<(), PipelineError> {
        run.advance(Phase::Completed)?;
        let progress = run.progress.enter(Phase::Completed);
        transport.emit(PipelineEvent::phase(Phase::Completed, progress, "Pipeline complete"));

        let summary = run.summary();
        info!(
            run_id = %run.id,
            total_jobs = summary.total_jobs,
            analyzed = summary.analyzed_jobs,
            high_fit = summary.high_fit_jobs,
            letters = summary.cover_letters_generated,
            skipped = summary.skipped.len(),
            "Pipeline completed"
        );
        transport.emit(PipelineEvent::Complete(summary));
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────
    // Per-item work
    // ────────────────────────────────────────────────────────────────────

    async fn analyze_job(
        &self,
        run_id: Uuid,
        profile: &CandidateProfile,
        job: &JobOpportunity,
        cancel: &CancellationToken,
    ) -> Result<FitAnalysis, PipelineError> {
        let hooks = retry_hooks(run_id, Phase::Analyzing, &job.id);
        let mut analysis = retry::execute(&self.settings.retry.analyzing, cancel, &hooks, || {
            self.collaborators.analyzer.score_job_fit(profile, job)
        })
        .await
        .map_err(|e| stage_failure(e, ErrorKind::AnalysisFailed, Phase::Analyzing))?;
        analysis.job_id = job.id.clone();
        Ok(analysis)
    }

    async fn draft_letter(
        &self,
        run_id: Uuid,
        profile: &CandidateProfile,
        job: &JobOpportunity,
        analysis: &FitAnalysis,
        template: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<CoverLetterDraft, PipelineError> {
        let hooks = retry_hooks(run_id, Phase::Generating, &job.id);
        let mut letter = retry::execute(&self.settings.retry.generating, cancel, &hooks, || {
            self.collaborators
                .letters
                .draft_cover_letter(profile, job, analysis, template)
        })
        .await
        .map_err(|e| stage_failure(e, ErrorKind::GenerationFailed, Phase::Generating))?;
        letter.job_id = job.id.clone();
        Ok(letter)
    }

    fn enter(
        &self,
        run: &mut PipelineRun,
        transport: &StreamTransport,
        phase: Phase,
        message: &str,
    ) -> Result<(), PipelineError> {
        run.advance(phase)?;
        let progress = run.progress.enter(phase);
        transport.emit(PipelineEvent::phase(phase, progress, message));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn stop_if_cancelled(run: &mut PipelineRun, transport: &StreamTransport) -> bool {
    if !transport.is_cancelled() {
        return false;
    }
    if run.phase() != Phase::Cancelled {
        info!(run_id = %run.id, phase = %run.phase(), "Pipeline cancelled");
        run.cancel();
    }
    true
}

fn emit_progress(
    run: &mut PipelineRun,
    transport: &StreamTransport,
    phase: Phase,
    range: PhaseRange,
    done: usize,
    total: usize,
    message: &str,
) {
    let progress = run.progress.report(range, done, total);
    transport.emit(PipelineEvent::phase(phase, progress, message));
}

fn retry_hooks<'a>(run_id: Uuid, stage: Phase, target: &'a str) -> RetryHooks<'a, PipelineError> {
    RetryHooks::default()
        .on_retry(move |attempt, delay, err: &PipelineError| {
            debug!(
                %run_id,
                %stage,
                item = target,
                attempt,
                delay_ms = delay.as_millis() as u64,
                code = %err.kind,
                "Retrying"
            );
        })
        .on_exhausted(move |attempts, err: &PipelineError| {
            warn!(%run_id, %stage, item = target, attempts, code = %err.kind, "Retries exhausted");
        })
}

/// Extractor-native kinds surface as-is; anything else from the parsing
/// stage becomes `PARSE_FAILED`, keeping its recoverability.
fn parse_failure(err: PipelineError) -> PipelineError {
    if err.kind.is_extraction_native() {
        err.with_phase(Phase::Parsing)
    } else {
        err.reclassify(ErrorKind::ParseFailed, Phase::Parsing)
    }
}

/// Rate limits and timeouts keep their kind; other per-item failures take
/// the stage's kind.
fn stage_failure(err: PipelineError, kind: ErrorKind, phase: Phase) -> PipelineError {
    match err.kind {
        ErrorKind::RateLimited | ErrorKind::Timeout => err.with_phase(phase),
        _ => err.reclassify(kind, phase),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
