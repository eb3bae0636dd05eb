use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pipeline_api::config::{Config, FitScorerBackend};
use pipeline_api::extract::DocumentTextExtractor;
use pipeline_api::generation::{
    FitAnalyzer, KeywordFitAnalyzer, LlmFitAnalyzer, LlmLetterGenerator, LlmProfileExtractor,
};
use pipeline_api::llm_client::LlmClient;
use pipeline_api::pipeline::{Collaborators, Orchestrator};
use pipeline_api::routes::build_router;
use pipeline_api::search::jsearch::HttpJobSearchClient;
use pipeline_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pipeline API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", pipeline_api::llm_client::MODEL);

    // Initialize job search provider
    let search = HttpJobSearchClient::new(
        config.job_search_api_url.clone(),
        config.job_search_api_key.clone(),
        config.job_search_api_host.clone(),
    );
    info!("Job search client initialized ({})", config.job_search_api_host);

    let analyzer: Arc<dyn FitAnalyzer> = match config.fit_scorer {
        FitScorerBackend::Llm => Arc::new(LlmFitAnalyzer(llm.clone())),
        FitScorerBackend::Keyword => Arc::new(KeywordFitAnalyzer),
    };
    info!("Fit scorer: {:?}", config.fit_scorer);

    let orchestrator = Orchestrator::new(
        config.pipeline.clone(),
        Collaborators {
            extractor: Arc::new(DocumentTextExtractor),
            profiles: Arc::new(LlmProfileExtractor(llm.clone())),
            search: Arc::new(search),
            analyzer,
            letters: Arc::new(LlmLetterGenerator(llm)),
        },
    );
    let state = AppState::new(orchestrator);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
