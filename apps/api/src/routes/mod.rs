pub mod health;
pub mod pipeline;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Headroom over the résumé limit for the config field and multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.orchestrator.settings().max_resume_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/pipeline", post(pipeline::handle_start_pipeline))
        .route(
            "/api/v1/pipeline/:run_id/cancel",
            post(pipeline::handle_cancel_pipeline),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::PipelineSettings;
    use crate::errors::PipelineError;
    use crate::extract::DocumentTextExtractor;
    use crate::generation::validation::{parse_contract, ProfileContract};
    use crate::generation::{KeywordFitAnalyzer, LetterGenerator, ProfileExtractor};
    use crate::models::{CandidateProfile, CoverLetterDraft, FitAnalysis, JobOpportunity};
    use crate::pipeline::{Collaborators, Orchestrator};
    use crate::search::{JobQuery, JobSearchClient};

    const BOUNDARY: &str = "pipeline-test-boundary";

    struct CannedProfile;

    #[async_trait]
    impl ProfileExtractor for CannedProfile {
        async fn extract_profile(&self, _resume_text: &str) -> Result<ProfileContract, PipelineError> {
            parse_contract(r#"{"skills": ["Rust"], "yearsOfExperience": 3, "seniorityLevel": "mid"}"#)
        }
    }

    struct NoJobs;

    #[async_trait]
    impl JobSearchClient for NoJobs {
        async fn search_jobs(&self, _query: &JobQuery) -> Result<Vec<JobOpportunity>, PipelineError> {
            Ok(vec![])
        }
    }

    struct NoLetters;

    #[async_trait]
    impl LetterGenerator for NoLetters {
        async fn draft_cover_letter(
            &self,
            _profile: &CandidateProfile,
            _job: &JobOpportunity,
            _analysis: &FitAnalysis,
            _template: Option<&str>,
        ) -> Result<CoverLetterDraft, PipelineError> {
            Err(PipelineError::unknown("no letters in this test"))
        }
    }

    fn app() -> (Router, AppState) {
        let orchestrator = Orchestrator::new(
            PipelineSettings::default(),
            Collaborators {
                extractor: Arc::new(DocumentTextExtractor),
                profiles: Arc::new(CannedProfile),
                search: Arc::new(NoJobs),
                analyzer: Arc::new(KeywordFitAnalyzer),
                letters: Arc::new(NoLetters),
            },
        );
        let state = AppState::new(orchestrator);
        (build_router(state.clone()), state)
    }

    fn multipart(resume: Option<&str>, config: &str) -> Request<Body> {
        let mut body = String::new();
        if let Some(text) = resume {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"resume.txt\"\r\nContent-Type: text/plain\r\n\r\n{text}\r\n"
            ));
        }
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"config\"\r\n\r\n{config}\r\n--{BOUNDARY}--\r\n"
        ));
        Request::builder()
            .method("POST")
            .uri("/api/v1/pipeline")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let (router, _) = app();
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "pipeline-api");
        assert_eq!(json["activeRuns"], 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_run_is_not_found() {
        let (router, _) = app();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/pipeline/{}/cancel", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_live_run_is_accepted() {
        let (router, state) = app();
        let registration = state.registry.register(Uuid::new_v4());
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/pipeline/{}/cancel", registration.run_id()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(registration.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_missing_resume_streams_validation_error() {
        let (router, _) = app();
        let response = router
            .oneshot(multipart(None, r#"{"targetRoles": ["Rust Engineer"]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert!(response.headers().contains_key("x-run-id"));
        let text = body_text(response).await;
        assert!(text.starts_with("event: error\n"));
        assert!(text.contains("\"code\":\"VALIDATION_FAILED\""));
        assert!(text.contains("\"phase\":\"idle\""));
    }

    #[tokio::test]
    async fn test_oversized_resume_streams_validation_error() {
        let (router, _) = app();
        let resume = "a".repeat(6 * 1024 * 1024);
        let response = router
            .oneshot(multipart(
                Some(&resume),
                r#"{"targetRoles": ["Rust Engineer"]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response).await;
        assert!(text.starts_with("event: error\n"));
        assert!(text.contains("\"code\":\"VALIDATION_FAILED\""));
        assert!(text.contains("\"phase\":\"idle\""));
        assert!(text.contains("\"recoverable\":false"));
    }

    #[tokio::test]
    async fn test_run_without_jobs_streams_to_complete() {
        let (router, _) = app();
        let response = router
            .oneshot(multipart(
                Some("Jane Doe\nRust engineer, 3 years"),
                r#"{"targetRoles": ["Rust Engineer"]}"#,
            ))
            .await
            .unwrap();

        let text = body_text(response).await;
        assert!(text.contains("event: profile\n"));
        assert!(text.contains("\"totalJobs\":0"));
        assert!(text.trim_end().rsplit("\n\n").next().unwrap().starts_with("event: complete"));
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_is_rejected() {
        let (router, _) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/pipeline")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .body(Body::from("this is not multipart"))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
