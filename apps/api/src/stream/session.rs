//! Client-side view of a run, rebuilt from the event stream.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{CandidateProfile, CoverLetterDraft, FitAnalysis, JobOpportunity};
use crate::pipeline::events::{CompletionSummary, ErrorPayload, PipelineEvent};
use crate::pipeline::phase::Phase;
use crate::stream::framing::{EventStreamParser, StreamProtocolError};

/// Reducer over received events. After `complete` or `error` the session
/// is frozen and further events are ignored.
#[derive(Debug)]
pub struct ClientSession {
    parser: EventStreamParser,
    pub phase: Phase,
    pub progress: u8,
    pub message: Option<String>,
    pub profile: Option<CandidateProfile>,
    pub jobs: Vec<JobOpportunity>,
    pub analyses: HashMap<String, FitAnalysis>,
    pub cover_letters: HashMap<String, CoverLetterDraft>,
    pub summary: Option<CompletionSummary>,
    pub error: Option<ErrorPayload>,
    pub last_heartbeat: Option<i64>,
    /// Every event applied, in order.
    pub log: Vec<PipelineEvent>,
    finished: bool,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self {
            parser: EventStreamParser::new(),
            phase: Phase::Idle,
            progress: 0,
            message: None,
            profile: None,
            jobs: Vec::new(),
            analyses: HashMap::new(),
            cover_letters: HashMap::new(),
            summary: None,
            error: None,
            last_heartbeat: None,
            log: Vec::new(),
            finished: false,
        }
    }
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds raw bytes from the wire and applies every completed event.
    pub fn ingest(&mut self, chunk: &[u8]) -> Result<(), StreamProtocolError> {
        for frame in self.parser.feed(chunk) {
            if let Some(event) = frame.decode()? {
                self.apply(event);
            }
        }
        Ok(())
    }

    /// Marks the end of the byte stream. A stream that closes without a
    /// terminal event was cancelled.
    pub fn end_of_stream(&mut self) -> Result<(), StreamProtocolError> {
        if let Some(frame) = self.parser.finish() {
            if let Some(event) = frame.decode()? {
                self.apply(event);
            }
        }
        if !self.finished {
            self.phase = Phase::Cancelled;
            self.finished = true;
        }
        Ok(())
    }

    /// Applies one event. Returns `false` if the session was already finished.
    pub fn apply(&mut self, event: PipelineEvent) -> bool {
        if self.finished {
            debug!("Ignoring {} event after stream end", event.label());
            return false;
        }
        self.log.push(event.clone());

        match event {
            PipelineEvent::Phase(update) => {
                self.phase = update.phase;
                self.progress = self.progress.max(update.progress);
                self.message = update.message;
            }
            PipelineEvent::Profile(profile) => self.profile = Some(profile),
            PipelineEvent::Job(job) => self.jobs.push(job),
            PipelineEvent::Analysis(analysis) => {
                self.analyses.insert(analysis.job_id.clone(), analysis);
            }
            PipelineEvent::CoverLetter(letter) => {
                self.cover_letters.insert(letter.job_id.clone(), letter);
            }
            PipelineEvent::Complete(summary) => {
                self.phase = Phase::Completed;
                self.progress = 100;
                self.summary = Some(summary);
                self.finished = true;
            }
            PipelineEvent::Error(error) => {
                self.phase = Phase::Error;
                self.error = Some(error);
                self.finished = true;
            }
            PipelineEvent::Heartbeat(beat) => self.last_heartbeat = Some(beat.timestamp),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::stream::framing::encode_frame;

    fn wire(events: &[PipelineEvent]) -> Vec<u8> {
        events
            .iter()
            .map(|e| encode_frame(e).unwrap())
            .collect::<String>()
            .into_bytes()
    }

    #[test]
    fn test_session_tracks_progress_and_summary() {
        let bytes = wire(&[
            PipelineEvent::phase(Phase::Parsing, 0, "Reading resume"),
            PipelineEvent::heartbeat_now(),
            PipelineEvent::phase(Phase::Searching, 15, "Searching"),
            PipelineEvent::phase(Phase::Completed, 100, "Done"),
            PipelineEvent::Complete(CompletionSummary::default()),
        ]);
        let mut session = ClientSession::new();
        for chunk in bytes.chunks(7) {
            session.ingest(chunk).unwrap();
        }
        session.end_of_stream().unwrap();

        assert!(session.is_finished());
        assert_eq!(session.phase, Phase::Completed);
        assert_eq!(session.progress, 100);
        assert!(session.last_heartbeat.is_some());
        assert_eq!(session.summary, Some(CompletionSummary::default()));
    }

    #[test]
    fn test_session_frozen_after_error() {
        let mut session = ClientSession::new();
        assert!(session.apply(PipelineEvent::Error(ErrorPayload {
            message: "bad".to_string(),
            code: ErrorKind::ParseFailed,
            phase: Phase::Parsing,
            recoverable: false,
        })));
        assert!(!session.apply(PipelineEvent::phase(Phase::Searching, 20, "late")));
        assert_eq!(session.phase, Phase::Error);
        assert_eq!(session.log.len(), 1);
    }

    #[test]
    fn test_stream_end_without_terminal_is_cancelled() {
        let mut session = ClientSession::new();
        session
            .ingest(&wire(&[PipelineEvent::phase(Phase::Parsing, 5, "x")]))
            .unwrap();
        session.end_of_stream().unwrap();
        assert_eq!(session.phase, Phase::Cancelled);
        assert!(session.error.is_none());
    }

    #[test]
    fn test_session_progress_never_regresses() {
        let mut session = ClientSession::new();
        session.apply(PipelineEvent::phase(Phase::Analyzing, 52, "a"));
        session.apply(PipelineEvent::phase(Phase::Analyzing, 40, "b"));
        assert_eq!(session.progress, 52);
    }
}
