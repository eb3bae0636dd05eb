//! Fit scoring: a pluggable, trait-based analyzer that measures a candidate
//! profile against one job listing.
//!
//! Default: `LlmFitAnalyzer` (semantic, via Claude).
//! Offline: `KeywordFitAnalyzer` (pure-Rust, fast, deterministic, fully testable).
//!
//! The orchestrator holds an `Arc<dyn FitAnalyzer>`, chosen at startup via `FIT_SCORER`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;

use crate::errors::PipelineError;
use crate::generation::prompts::{FIT_PROMPT_TEMPLATE, FIT_ROLE};
use crate::generation::validation::{parse_contract, FitContract};
use crate::llm_client::prompts::{json_system, truncate_chars, GROUNDING_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::{CandidateProfile, FitAnalysis, FitBreakdown, JobOpportunity, SeniorityLevel, SubScore};

const MAX_DESCRIPTION_CHARS: usize = 12_000;

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The fit analyzer trait. Implement this to swap backends without touching
/// the orchestrator.
#[async_trait]
pub trait FitAnalyzer: Send + Sync {
    async fn score_job_fit(
        &self,
        profile: &CandidateProfile,
        job: &JobOpportunity,
    ) -> Result<FitAnalysis, PipelineError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmFitAnalyzer (default backend)
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmFitAnalyzer(pub LlmClient);

#[async_trait]
impl FitAnalyzer for LlmFitAnalyzer {
    async fn score_job_fit(
        &self,
        profile: &CandidateProfile,
        job: &JobOpportunity,
    ) -> Result<FitAnalysis, PipelineError> {
        let prompt = build_fit_prompt(profile, job)?;
        let raw = self.0.call_text(&prompt, &json_system(FIT_ROLE)).await?;
        let contract: FitContract = parse_contract(&raw)?;
        contract.validate()?;
        Ok(contract.into_analysis(&job.id))
    }
}

fn build_fit_prompt(profile: &CandidateProfile, job: &JobOpportunity) -> Result<String, PipelineError> {
    let mut job = job.clone();
    job.description = truncate_chars(&job.description, MAX_DESCRIPTION_CHARS);

    let profile_json = serde_json::to_string_pretty(profile)
        .map_err(|e| PipelineError::unknown(format!("Failed to serialize profile: {e}")))?;
    let job_json = serde_json::to_string_pretty(&job)
        .map_err(|e| PipelineError::unknown(format!("Failed to serialize job: {e}")))?;

    Ok(FIT_PROMPT_TEMPLATE
        .replace("{grounding}", GROUNDING_INSTRUCTION)
        .replace("{profile_json}", &profile_json)
        .replace("{job_json}", &job_json))
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordFitAnalyzer (offline backend)
// ────────────────────────────────────────────────────────────────────────────

/// Pure-Rust keyword fit analyzer. Fast, deterministic, no LLM call.
///
/// Sub-scores:
/// 1. skills: share of listed requirements that mention a profile skill,
///    or (with no requirements) profile skills found in the listing text
/// 2. experience: candidate years against the largest "N years" in the listing
/// 3. tech stack: share of the listing's technologies the candidate knows
/// 4. seniority: level distance between job title and profile
///
/// overall_score = Σ(weight × sub-score), weights from `models::analysis`.
pub struct KeywordFitAnalyzer;

#[async_trait]
impl FitAnalyzer for KeywordFitAnalyzer {
    async fn score_job_fit(
        &self,
        profile: &CandidateProfile,
        job: &JobOpportunity,
    ) -> Result<FitAnalysis, PipelineError> {
        Ok(compute_keyword_fit(profile, job))
    }
}

const KEYWORD_CONFIDENCE: f32 = 0.5;
const NO_REQUIREMENT_SCORE: u8 = 70;
const UNKNOWN_SENIORITY_SCORE: u8 = 70;
const NO_TECH_LISTED_SCORE: u8 = 50;
/// Skill matches needed for a full skills score when the listing has no requirements.
const SKILL_SAMPLE: usize = 5;

fn compute_keyword_fit(profile: &CandidateProfile, job: &JobOpportunity) -> FitAnalysis {
    let text = listing_text(job);

    let breakdown = FitBreakdown {
        skills: score_skills(profile, job, &text),
        experience: score_experience(profile, &text),
        tech_stack: score_tech_stack(profile, job),
        seniority: score_seniority(profile, job),
    };
    let overall_score = breakdown.weighted_score();

    let mut strengths: Vec<String> = breakdown
        .tech_stack
        .matched
        .iter()
        .map(|t| format!("Hands-on with {t}"))
        .collect();
    if breakdown.experience.score == 100 {
        strengths.push("Meets the stated experience requirement".to_string());
    }

    let mut concerns: Vec<String> = breakdown
        .tech_stack
        .missing
        .iter()
        .take(3)
        .map(|t| format!("No evidence of {t}"))
        .collect();
    if breakdown.seniority.score <= 40 {
        concerns.push(breakdown.seniority.rationale.clone());
    }
    if breakdown.experience.score < 100 && !breakdown.experience.missing.is_empty() {
        concerns.push(breakdown.experience.rationale.clone());
    }

    let summary = build_recommendation(overall_score, &breakdown.tech_stack.missing);

    FitAnalysis {
        job_id: job.id.clone(),
        overall_score,
        breakdown,
        confidence: KEYWORD_CONFIDENCE,
        summary,
        concerns,
        strengths,
        analyzed_at: Utc::now(),
    }
}

fn listing_text(job: &JobOpportunity) -> String {
    let mut text = format!("{}\n{}", job.title, job.description);
    for requirement in &job.requirements {
        text.push('\n');
        text.push_str(requirement);
    }
    text.to_lowercase()
}

/// Whole-word, case-insensitive containment. `haystack` must already be lower-cased.
fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    haystack.match_indices(&term).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn ratio_score(hit: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((hit.min(total) as f32 / total as f32) * 100.0).round() as u8
}

fn score_skills(profile: &CandidateProfile, job: &JobOpportunity, text: &str) -> SubScore {
    let terms: Vec<&String> = profile.skills.iter().chain(profile.tech_stack.iter()).collect();

    if !job.requirements.is_empty() {
        let (matched, missing): (Vec<String>, Vec<String>) = job
            .requirements
            .iter()
            .cloned()
            .partition(|req| {
                let req = req.to_lowercase();
                terms.iter().any(|t| contains_term(&req, t))
            });
        return SubScore {
            score: ratio_score(matched.len(), job.requirements.len()),
            rationale: format!(
                "{} of {} listed requirements mention a skill from the profile",
                matched.len(),
                job.requirements.len()
            ),
            matched,
            missing,
        };
    }

    if profile.skills.is_empty() {
        return SubScore {
            score: 0,
            matched: vec![],
            missing: vec![],
            rationale: "Profile lists no skills".to_string(),
        };
    }

    let matched: Vec<String> = profile
        .skills
        .iter()
        .filter(|s| contains_term(text, s))
        .cloned()
        .collect();
    SubScore {
        score: ratio_score(matched.len(), profile.skills.len().min(SKILL_SAMPLE)),
        rationale: format!(
            "{} profile skills appear in the listing, which states no explicit requirements",
            matched.len()
        ),
        matched,
        missing: vec![],
    }
}

/// Largest "N years" / "N+ yrs" / "N-M years" figure in the text.
fn required_years(text: &str) -> Option<f32> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens
        .windows(2)
        .filter_map(|pair| {
            let unit = pair[1].trim_matches(|c: char| !c.is_alphanumeric());
            if !(unit.starts_with("year") || unit.starts_with("yr")) {
                return None;
            }
            let digits: String = pair[0]
                .trim_start_matches('(')
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<u32>().ok()
        })
        .filter(|n| (1..=40).contains(n))
        .max()
        .map(|n| n as f32)
}

fn score_experience(profile: &CandidateProfile, text: &str) -> SubScore {
    let years = profile.years_of_experience;
    let Some(required) = required_years(text) else {
        return SubScore {
            score: NO_REQUIREMENT_SCORE,
            matched: vec![],
            missing: vec![],
            rationale: "Listing states no minimum experience".to_string(),
        };
    };

    if years >= required {
        SubScore {
            score: 100,
            matched: vec![format!("{years} years")],
            missing: vec![],
            rationale: format!("{years} years against {required}+ required"),
        }
    } else {
        SubScore {
            score: ((years / required) * 100.0).round().clamp(0.0, 100.0) as u8,
            matched: vec![],
            missing: vec![format!("{required}+ years")],
            rationale: format!("{years} years against {required}+ required"),
        }
    }
}

fn score_tech_stack(profile: &CandidateProfile, job: &JobOpportunity) -> SubScore {
    if job.tech_stack.is_empty() {
        return SubScore {
            score: NO_TECH_LISTED_SCORE,
            matched: vec![],
            missing: vec![],
            rationale: "Listing names no specific technologies".to_string(),
        };
    }

    let known: HashSet<String> = profile
        .tech_stack
        .iter()
        .chain(profile.skills.iter())
        .map(|t| t.trim().to_lowercase())
        .collect();
    let (matched, missing): (Vec<String>, Vec<String>) = job
        .tech_stack
        .iter()
        .cloned()
        .partition(|t| known.contains(&t.trim().to_lowercase()));

    SubScore {
        score: ratio_score(matched.len(), job.tech_stack.len()),
        rationale: format!(
            "{} of {} listed technologies are in the profile",
            matched.len(),
            job.tech_stack.len()
        ),
        matched,
        missing,
    }
}

fn score_seniority(profile: &CandidateProfile, job: &JobOpportunity) -> SubScore {
    let candidate = profile.seniority_level;
    let Some(role) = SeniorityLevel::from_title(&job.title) else {
        return SubScore {
            score: UNKNOWN_SENIORITY_SCORE,
            matched: vec![],
            missing: vec![],
            rationale: "Role level is not stated in the title".to_string(),
        };
    };

    let distance = role.rank().abs_diff(candidate.rank());
    let score = match distance {
        0 => 100,
        1 => 70,
        2 => 40,
        _ => 10,
    };
    SubScore {
        score,
        matched: if distance == 0 {
            vec![role.as_str().to_string()]
        } else {
            vec![]
        },
        missing: vec![],
        rationale: format!(
            "Role reads as {}, candidate is {}",
            role.as_str(),
            candidate.as_str()
        ),
    }
}

/// Builds a human-readable recommendation string from score and gaps.
fn build_recommendation(score: u8, gaps: &[String]) -> String {
    let top_gaps: Vec<&str> = gaps.iter().take(3).map(String::as_str).collect();

    if score >= 80 {
        "Strong fit. The profile directly covers the key requirements.".to_string()
    } else if top_gaps.is_empty() {
        format!("Partial fit ({score}/100) on skills, experience and level.")
    } else if score >= 60 {
        format!(
            "Moderate fit ({score}/100). Gaps worth addressing: {}.",
            top_gaps.join(", ")
        )
    } else {
        format!(
            "Low fit ({score}/100). Significant gaps: {}.",
            top_gaps.join(", ")
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
