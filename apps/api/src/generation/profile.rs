//! Profile extraction: résumé text in, validated profile contract out.

use async_trait::async_trait;
use tracing::debug;

use crate::errors::PipelineError;
use crate::generation::prompts::{PROFILE_PROMPT_TEMPLATE, PROFILE_ROLE};
use crate::generation::validation::{parse_contract, ProfileContract};
use crate::llm_client::prompts::{json_system, truncate_chars, GROUNDING_INSTRUCTION};
use crate::llm_client::LlmClient;

const MAX_RESUME_CHARS: usize = 30_000;

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    async fn extract_profile(&self, resume_text: &str) -> Result<ProfileContract, PipelineError>;
}

pub struct LlmProfileExtractor(pub LlmClient);

#[async_trait]
impl ProfileExtractor for LlmProfileExtractor {
    async fn extract_profile(&self, resume_text: &str) -> Result<ProfileContract, PipelineError> {
        let prompt = build_profile_prompt(resume_text);
        let raw = self.0.call_text(&prompt, &json_system(PROFILE_ROLE)).await?;
        let contract: ProfileContract = parse_contract(&raw)?;
        contract.validate()?;
        debug!(
            "Profile extracted: {} skills, {:.1} years",
            contract.skills.len(),
            contract.years_of_experience
        );
        Ok(contract)
    }
}

fn build_profile_prompt(resume_text: &str) -> String {
    PROFILE_PROMPT_TEMPLATE
        .replace("{grounding}", GROUNDING_INSTRUCTION)
        .replace("{resume_text}", &truncate_chars(resume_text, MAX_RESUME_CHARS))
}
