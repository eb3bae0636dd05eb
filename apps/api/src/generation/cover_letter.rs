//! Cover letter drafting for jobs that passed the fit threshold.

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::generation::prompts::{LETTER_PROMPT_TEMPLATE, LETTER_ROLE, LETTER_TEMPLATE_SECTION};
use crate::generation::validation::{parse_contract, LetterContract};
use crate::llm_client::prompts::{json_system, truncate_chars, GROUNDING_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::{CandidateProfile, CoverLetterDraft, FitAnalysis, JobOpportunity};

const MAX_TEMPLATE_CHARS: usize = 4_000;

#[async_trait]
pub trait LetterGenerator: Send + Sync {
    async fn draft_cover_letter(
        &self,
        profile: &CandidateProfile,
        job: &JobOpportunity,
        analysis: &FitAnalysis,
        template: Option<&str>,
    ) -> Result<CoverLetterDraft, PipelineError>;
}

pub struct LlmLetterGenerator(pub LlmClient);

#[async_trait]
impl LetterGenerator for LlmLetterGenerator {
    async fn draft_cover_letter(
        &self,
        profile: &CandidateProfile,
        job: &JobOpportunity,
        analysis: &FitAnalysis,
        template: Option<&str>,
    ) -> Result<CoverLetterDraft, PipelineError> {
        let prompt = build_letter_prompt(profile, job, analysis, template)?;
        let raw = self.0.call_text(&prompt, &json_system(LETTER_ROLE)).await?;
        let contract: LetterContract = parse_contract(&raw)?;
        contract.validate()?;
        Ok(contract.into_draft(&job.id))
    }
}

fn build_letter_prompt(
    profile: &CandidateProfile,
    job: &JobOpportunity,
    analysis: &FitAnalysis,
    template: Option<&str>,
) -> Result<String, PipelineError> {
    let to_json = |value: serde_json::Result<String>| {
        value.map_err(|e| PipelineError::unknown(format!("Failed to serialize prompt input: {e}")))
    };
    let template_section = match template.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => LETTER_TEMPLATE_SECTION.replace("{template}", &truncate_chars(t, MAX_TEMPLATE_CHARS)),
        None => String::new(),
    };

    Ok(LETTER_PROMPT_TEMPLATE
        .replace("{template_section}", &template_section)
        .replace("{grounding}", GROUNDING_INSTRUCTION)
        .replace("{profile_json}", &to_json(serde_json::to_string_pretty(profile))?)
        .replace("{job_json}", &to_json(serde_json::to_string_pretty(job))?)
        .replace("{analysis_json}", &to_json(serde_json::to_string_pretty(analysis))?))
}
