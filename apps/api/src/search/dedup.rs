//! Aggregation of per-role search results: ignore-list filter, salary
//! filter and (company, title) deduplication. First occurrence wins.

use std::collections::HashSet;

use tracing::debug;

use crate::models::{JobOpportunity, SalaryRange};

/// Drops listings whose company contains any excluded name (case-insensitive).
pub fn filter_excluded(jobs: Vec<JobOpportunity>, exclude_companies: &[String]) -> Vec<JobOpportunity> {
    let excluded: Vec<String> = exclude_companies
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    if excluded.is_empty() {
        return jobs;
    }

    jobs.into_iter()
        .filter(|job| {
            let company = job.company.to_lowercase();
            let keep = !excluded.iter().any(|ex| company.contains(ex.as_str()));
            if !keep {
                debug!("Excluding {} at {}", job.title, job.company);
            }
            keep
        })
        .collect()
}

/// Drops listings whose advertised maximum is below the requested minimum.
/// Listings without salary information are kept.
pub fn filter_by_salary(jobs: Vec<JobOpportunity>, wanted: Option<&SalaryRange>) -> Vec<JobOpportunity> {
    let Some(min_wanted) = wanted.and_then(|r| r.min) else {
        return jobs;
    };

    jobs.into_iter()
        .filter(|job| {
            job.salary_range
                .as_ref()
                .and_then(|s| s.max)
                .map_or(true, |max| max >= min_wanted)
        })
        .collect()
}

/// Removes later listings with the same lower-cased (company, title).
pub fn dedupe(jobs: Vec<JobOpportunity>) -> Vec<JobOpportunity> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| seen.insert(job.dedup_key()))
        .collect()
}

/// Filter then dedupe, preserving listing order.
pub fn aggregate(
    jobs: Vec<JobOpportunity>,
    exclude_companies: &[String],
    salary: Option<&SalaryRange>,
) -> Vec<JobOpportunity> {
    let before = jobs.len();
    let jobs = dedupe(filter_by_salary(filter_excluded(jobs, exclude_companies), salary));
    debug!("Aggregated {} raw listings into {}", before, jobs.len());
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobSource, RemoteStatus};
    use chrono::Utc;

    fn job(id: &str, company: &str, title: &str) -> JobOpportunity {
        JobOpportunity {
            id: id.to_string(),
            title: title.to_string(),
            company: company.to_string(),
            location: "Remote".to_string(),
            remote_status: RemoteStatus::Remote,
            description: String::new(),
            requirements: vec![],
            tech_stack: vec![],
            application_url: None,
            source: JobSource::Jsearch,
            posted_date: None,
            salary_range: None,
            retrieved_at: Utc::now(),
        }
    }

    #[test]
    fn test_dedupe_is_case_insensitive_and_keeps_first() {
        let jobs = vec![
            job("1", "Acme", "ML Engineer"),
            job("2", "ACME", "ml engineer"),
            job("3", "Acme", "Data Engineer"),
        ];
        let ids: Vec<_> = dedupe(jobs).into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_excluded_companies_removed() {
        let jobs = vec![job("1", "Evil Corp Inc", "SWE"), job("2", "Good Co", "SWE")];
        let kept = filter_excluded(jobs, &["evil corp".to_string(), "  ".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "2");
    }

    #[test]
    fn test_salary_filter_keeps_unknown_salary() {
        let mut low = job("1", "A", "SWE");
        low.salary_range = Some(SalaryRange {
            min: Some(50_000),
            max: Some(70_000),
            currency: None,
        });
        let unknown = job("2", "B", "SWE");
        let wanted = SalaryRange {
            min: Some(100_000),
            max: None,
            currency: None,
        };
        let kept = filter_by_salary(vec![low, unknown], Some(&wanted));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "2");
    }

    #[test]
    fn test_aggregate_filters_before_dedup() {
        let jobs = vec![
            job("1", "Blocked Ltd", "SWE"),
            job("2", "Acme", "SWE"),
            job("3", "acme", "swe"),
        ];
        let kept = aggregate(jobs, &["blocked".to_string()], None);
        let ids: Vec<_> = kept.into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["2"]);
    }
}
