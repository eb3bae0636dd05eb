//! HTTP client for a JSearch-compatible job-listing API.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{ErrorKind, PipelineError};
use crate::models::{JobOpportunity, JobSource, RemoteStatus, SalaryRange, WorkPreference};
use crate::search::{JobQuery, JobSearchClient};

/// Technologies recognised in free-text descriptions when the provider
/// does not list required skills.
const TECH_KEYWORDS: &[&str] = &[
    "python", "rust", "go", "java", "kotlin", "scala", "typescript", "javascript", "c++",
    "c#", "ruby", "php", "swift", "sql", "postgresql", "mysql", "mongodb", "redis",
    "kafka", "spark", "airflow", "docker", "kubernetes", "terraform", "aws", "gcp",
    "azure", "react", "node.js", "django", "fastapi", "flask", "pytorch", "tensorflow",
    "scikit-learn", "pandas", "graphql", "grpc", "linux",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ProviderJob>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderHighlights {
    #[serde(rename = "Qualifications", default)]
    qualifications: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderJob {
    job_id: Option<String>,
    job_title: Option<String>,
    employer_name: Option<String>,
    job_city: Option<String>,
    job_state: Option<String>,
    job_country: Option<String>,
    job_is_remote: Option<bool>,
    job_description: Option<String>,
    job_apply_link: Option<String>,
    job_publisher: Option<String>,
    job_posted_at_datetime_utc: Option<String>,
    job_min_salary: Option<f64>,
    job_max_salary: Option<f64>,
    job_salary_currency: Option<String>,
    job_highlights: Option<ProviderHighlights>,
    job_required_skills: Option<Vec<String>>,
}

/// Job search backed by the provider's REST API. Credentials are held by
/// the instance, never read from the environment at call time.
#[derive(Clone)]
pub struct HttpJobSearchClient {
    client: Client,
    api_url: String,
    api_key: String,
    api_host: String,
}

impl HttpJobSearchClient {
    pub fn new(api_url: String, api_key: String, api_host: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_url,
            api_key,
            api_host,
        }
    }

    fn query_params(query: &JobQuery) -> Vec<(&'static str, String)> {
        let text = match &query.location_hint {
            Some(location) => format!("{} in {}", query.query, location),
            None => query.query.clone(),
        };
        let mut params = vec![
            ("query", text),
            ("page", "1".to_string()),
            ("num_pages", "1".to_string()),
            ("date_posted", "month".to_string()),
        ];
        if query.work_preference == Some(WorkPreference::Remote) {
            params.push(("remote_jobs_only", "true".to_string()));
        }
        if let Some(radius) = query.radius {
            params.push(("radius", radius.to_string()));
        }
        params
    }
}

#[async_trait::async_trait]
impl JobSearchClient for HttpJobSearchClient {
    async fn search_jobs(&self, query: &JobQuery) -> Result<Vec<JobOpportunity>, PipelineError> {
        let response = self
            .client
            .get(&self.api_url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .query(&Self::query_params(query))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Job search returned {} for '{}': {}", status, query.query, body);
            return Err(status_error(status, &body));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            PipelineError::new(
                ErrorKind::UpstreamError,
                format!("Job search returned an unreadable body: {e}"),
            )
            .with_phase(crate::pipeline::phase::Phase::Searching)
            .with_recoverable(false)
        })?;

        let retrieved_at = Utc::now();
        let jobs: Vec<JobOpportunity> = parsed
            .data
            .into_iter()
            .filter_map(|job| normalize(job, retrieved_at))
            .collect();
        debug!("Job search for '{}' returned {} listings", query.query, jobs.len());
        Ok(jobs)
    }
}

fn transport_error(e: reqwest::Error) -> PipelineError {
    if e.is_timeout() {
        PipelineError::new(ErrorKind::Timeout, format!("Job search timed out: {e}"))
    } else {
        PipelineError::new(
            ErrorKind::UpstreamError,
            format!("Job search network error: {e}"),
        )
    }
}

fn status_error(status: StatusCode, body: &str) -> PipelineError {
    let code = status.as_u16();
    let snippet: String = body.chars().take(200).collect();
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PipelineError::new(
            ErrorKind::AuthFailed,
            "Job search provider rejected the credentials",
        ),
        StatusCode::TOO_MANY_REQUESTS => PipelineError::new(
            ErrorKind::RateLimited,
            "Job search provider rate limit exceeded",
        ),
        s => PipelineError::new(
            ErrorKind::UpstreamError,
            format!("Job search provider returned {code}: {snippet}"),
        )
        .with_recoverable(s.is_server_error()),
    };
    err.with_status(code)
}

fn normalize(job: ProviderJob, retrieved_at: DateTime<Utc>) -> Option<JobOpportunity> {
    let title = job.job_title.filter(|t| !t.trim().is_empty())?;
    let company = job.employer_name.filter(|c| !c.trim().is_empty())?;
    let description = job.job_description.unwrap_or_default();

    let location = [job.job_city, job.job_state, job.job_country]
        .into_iter()
        .flatten()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let remote_status = match job.job_is_remote {
        Some(true) => RemoteStatus::Remote,
        Some(false) => RemoteStatus::Onsite,
        None => RemoteStatus::Unknown,
    };

    let tech_stack = match job.job_required_skills {
        Some(skills) if !skills.is_empty() => skills,
        _ => extract_tech_stack(&description),
    };
    let salary_range = match (job.job_min_salary, job.job_max_salary) {
        (None, None) => None,
        (min, max) => Some(SalaryRange {
            min: min.map(|v| v.max(0.0) as u32),
            max: max.map(|v| v.max(0.0) as u32),
            currency: job.job_salary_currency,
        }),
    };

    Some(JobOpportunity {
        id: job.job_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        title: title.trim().to_string(),
        company: company.trim().to_string(),
        location: if location.is_empty() {
            "Unspecified".to_string()
        } else {
            location
        },
        remote_status,
        description,
        requirements: job.job_highlights.unwrap_or_default().qualifications,
        tech_stack,
        application_url: job.job_apply_link,
        source: JobSource::from_publisher(job.job_publisher.as_deref().unwrap_or_default()),
        posted_date: job
            .job_posted_at_datetime_utc
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc)),
        salary_range,
        retrieved_at,
    })
}

/// Known technologies mentioned in `description`, in keyword-list order.
pub fn extract_tech_stack(description: &str) -> Vec<String> {
    let tokens: Vec<String> = description
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | '/' | ':'))
        .map(|t| t.trim_end_matches('.').to_string())
        .filter(|t| !t.is_empty())
        .collect();

    TECH_KEYWORDS
        .iter()
        .filter(|kw| tokens.iter().any(|t| t == *kw))
        .map(|kw| kw.to_string())
        .collect()
}
