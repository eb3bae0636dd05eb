//! Domain records produced by the pipeline stages. All are immutable once
//! created; the orchestrator only ever adds new ones to a run.

pub mod analysis;
pub mod cover_letter;
pub mod job;
pub mod profile;

pub use analysis::{FitAnalysis, FitBreakdown, SubScore};
pub use cover_letter::CoverLetterDraft;
pub use job::{JobOpportunity, JobSource, RemoteStatus, SalaryRange, WorkPreference};
pub use profile::{CandidateProfile, Education, JobHistoryEntry, ProfileMetadata, SeniorityLevel, SourceFormat};
