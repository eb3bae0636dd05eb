use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weights of the four sub-scores in the overall fit score.
pub const SKILLS_WEIGHT: f32 = 0.35;
pub const EXPERIENCE_WEIGHT: f32 = 0.25;
pub const TECH_STACK_WEIGHT: f32 = 0.25;
pub const SENIORITY_WEIGHT: f32 = 0.15;

/// One dimension of the fit score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubScore {
    pub score: u8, // 0 – 100
    #[serde(default)]
    pub matched: Vec<String>,
    #[serde(default)]
    pub missing: Vec<String>,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitBreakdown {
    pub skills: SubScore,
    pub experience: SubScore,
    pub tech_stack: SubScore,
    pub seniority: SubScore,
}

impl FitBreakdown {
    pub fn sub_scores(&self) -> [(&'static str, &SubScore); 4] {
        [
            ("skills", &self.skills),
            ("experience", &self.experience),
            ("techStack", &self.tech_stack),
            ("seniority", &self.seniority),
        ]
    }

    /// Σ(weight × sub-score), rounded.
    pub fn weighted_score(&self) -> u8 {
        let total = self.skills.score as f32 * SKILLS_WEIGHT
            + self.experience.score as f32 * EXPERIENCE_WEIGHT
            + self.tech_stack.score as f32 * TECH_STACK_WEIGHT
            + self.seniority.score as f32 * SENIORITY_WEIGHT;
        total.round().clamp(0.0, 100.0) as u8
    }
}

/// Per-job fit analysis. At most one per job id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitAnalysis {
    pub job_id: String,
    pub overall_score: u8, // 0 – 100
    pub breakdown: FitBreakdown,
    pub confidence: f32, // 0.0 – 1.0
    pub summary: String,
    pub concerns: Vec<String>,
    pub strengths: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}
