use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::retry::RetryPolicy;

const DEFAULT_JOB_SEARCH_API_URL: &str = "https://jsearch.p.rapidapi.com/search";
const DEFAULT_JOB_SEARCH_API_HOST: &str = "jsearch.p.rapidapi.com";

/// Which `FitAnalyzer` backend the service runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitScorerBackend {
    Llm,
    Keyword,
}

impl std::str::FromStr for FitScorerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "llm" => Ok(FitScorerBackend::Llm),
            "keyword" => Ok(FitScorerBackend::Keyword),
            other => bail!("FIT_SCORER must be 'llm' or 'keyword', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub job_search_api_key: String,
    pub job_search_api_url: String,
    pub job_search_api_host: String,
    pub port: u16,
    pub rust_log: String,
    pub fit_scorer: FitScorerBackend,
    pub pipeline: PipelineSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            heartbeat_interval: Duration::from_secs(parse_env(
                "HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval.as_secs(),
            )?),
            max_resume_bytes: parse_env("MAX_RESUME_BYTES", defaults.max_resume_bytes)?,
            default_min_fit_score: parse_env("DEFAULT_MIN_FIT_SCORE", defaults.default_min_fit_score)?,
            analysis_batch_size: parse_env("ANALYSIS_BATCH_SIZE", defaults.analysis_batch_size)?,
            timeout: optional_env::<u64>("PIPELINE_TIMEOUT_SECS")?.map(Duration::from_secs),
            retry: RetryPolicies::default(),
        };
        pipeline.check()?;

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            job_search_api_key: require_env("JOB_SEARCH_API_KEY")?,
            job_search_api_url: std::env::var("JOB_SEARCH_API_URL")
                .unwrap_or_else(|_| DEFAULT_JOB_SEARCH_API_URL.to_string()),
            job_search_api_host: std::env::var("JOB_SEARCH_API_HOST")
                .unwrap_or_else(|_| DEFAULT_JOB_SEARCH_API_HOST.to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            fit_scorer: std::env::var("FIT_SCORER")
                .unwrap_or_else(|_| "llm".to_string())
                .parse()?,
            pipeline,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        _ => Ok(None),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(optional_env(key)?.unwrap_or(default))
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline settings
// ────────────────────────────────────────────────────────────────────────────

/// Backoff policy per stage.
#[derive(Debug, Clone)]
pub struct RetryPolicies {
    pub parsing: RetryPolicy,
    pub searching: RetryPolicy,
    pub analyzing: RetryPolicy,
    pub generating: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            parsing: RetryPolicy::standard(),
            searching: RetryPolicy::rate_limited(),
            analyzing: RetryPolicy::fast(),
            generating: RetryPolicy::fast(),
        }
    }
}

/// Immutable settings handed to the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub heartbeat_interval: Duration,
    pub max_resume_bytes: usize,
    /// Used when the request carries no `minFitScore`.
    pub default_min_fit_score: u8,
    pub analysis_batch_size: usize,
    /// Overall wall-clock budget for one run.
    pub timeout: Option<Duration>,
    pub retry: RetryPolicies,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            max_resume_bytes: 5 * 1024 * 1024,
            default_min_fit_score: 60,
            analysis_batch_size: 3,
            timeout: None,
            retry: RetryPolicies::default(),
        }
    }
}

impl PipelineSettings {
    fn check(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            bail!("HEARTBEAT_INTERVAL_SECS must be greater than zero");
        }
        if self.analysis_batch_size == 0 {
            bail!("ANALYSIS_BATCH_SIZE must be greater than zero");
        }
        if self.default_min_fit_score > 100 {
            bail!("DEFAULT_MIN_FIT_SCORE must be between 0 and 100");
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            bail!("PIPELINE_TIMEOUT_SECS must be greater than zero when set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = PipelineSettings::default();
        settings.check().unwrap();
        assert_eq!(settings.analysis_batch_size, 3);
        assert_eq!(settings.retry.parsing.max_attempts, 3);
        assert_eq!(settings.retry.analyzing.max_attempts, 2);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let settings = PipelineSettings {
            analysis_batch_size: 0,
            ..PipelineSettings::default()
        };
        assert!(settings.check().is_err());
    }

    #[test]
    fn test_fit_scorer_parse() {
        assert_eq!("LLM".parse::<FitScorerBackend>().unwrap(), FitScorerBackend::Llm);
        assert_eq!(
            " keyword ".parse::<FitScorerBackend>().unwrap(),
            FitScorerBackend::Keyword
        );
        assert!("semantic".parse::<FitScorerBackend>().is_err());
    }
}
