// Language-model collaborators: profile extraction, fit analysis, cover letters.
// All LLM calls go through llm_client; no direct Anthropic calls here.
// Model output is parsed and schema-checked in `validation` before it becomes
// a domain record.

pub mod cover_letter;
pub mod fit_scoring;
pub mod profile;
pub mod prompts;
pub mod validation;

pub use cover_letter::{LetterGenerator, LlmLetterGenerator};
pub use fit_scoring::{FitAnalyzer, KeywordFitAnalyzer, LlmFitAnalyzer};
pub use profile::{LlmProfileExtractor, ProfileExtractor};
