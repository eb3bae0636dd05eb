//! Pipeline endpoints: start a run and stream its events, or cancel a live run.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::BytesMut;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::request::{PipelineRequest, ResumeDocument};
use crate::state::AppState;
use crate::stream::StreamTransport;

/// Multipart field carrying the résumé file.
pub const RESUME_FIELD: &str = "resume";
/// Multipart field carrying the JSON search configuration.
pub const CONFIG_FIELD: &str = "config";

/// POST /api/v1/pipeline
///
/// Responds immediately with an event stream; the run itself happens on a
/// spawned task. Request validation failures arrive as an `error` event, only
/// an unreadable multipart body is rejected with a 400.
pub async fn handle_start_pipeline(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let max_resume_bytes = state.orchestrator.settings().max_resume_bytes;
    let request = read_pipeline_request(multipart, max_resume_bytes).await?;

    let registration = state.registry.register(Uuid::new_v4());
    let run_id = registration.run_id();
    let (transport, rx) = StreamTransport::open(run_id, registration.token());
    info!(%run_id, "Pipeline stream opened");

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        // Keeps the run cancellable until the orchestrator returns.
        let _registration = registration;
        orchestrator.run(request, transport).await;
    });

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    let run_header = HeaderValue::from_str(&run_id.to_string())
        .map_err(|e| AppError::Internal(e.into()))?;
    headers.insert(HeaderName::from_static("x-run-id"), run_header);

    let body = Body::from_stream(rx.into_frames());
    Ok((StatusCode::OK, headers, body).into_response())
}

/// POST /api/v1/pipeline/:run_id/cancel
pub async fn handle_cancel_pipeline(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !state.registry.cancel(&run_id) {
        return Err(AppError::NotFound(format!("No active pipeline run {run_id}")));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "runId": run_id, "status": "cancelling" })),
    ))
}

/// Reads the multipart body. Running past the size limit only marks the
/// request `oversized`; `validate` turns that into a streamed error.
async fn read_pipeline_request(
    mut multipart: Multipart,
    max_resume_bytes: usize,
) -> Result<PipelineRequest, AppError> {
    let mut request = PipelineRequest::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if exceeds_limit(&e) => {
                request.oversized = true;
                break;
            }
            Err(e) => return Err(malformed(e)),
        };
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(RESUME_FIELD) => {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let mut field = field;
                let mut buf = BytesMut::new();
                loop {
                    match field.chunk().await {
                        Ok(Some(chunk)) => {
                            buf.extend_from_slice(&chunk);
                            if buf.len() > max_resume_bytes {
                                request.oversized = true;
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) if exceeds_limit(&e) => {
                            request.oversized = true;
                            break;
                        }
                        Err(e) => return Err(malformed(e)),
                    }
                }
                request.document = Some(ResumeDocument {
                    file_name,
                    content_type,
                    bytes: buf.freeze(),
                });
            }
            Some(CONFIG_FIELD) => match field.text().await {
                Ok(text) => request.config_json = Some(text),
                Err(e) if exceeds_limit(&e) => request.oversized = true,
                Err(e) => return Err(malformed(e)),
            },
            other => debug!("Ignoring multipart field {:?}", other),
        }
        if request.oversized {
            debug!(max_resume_bytes, "Upload exceeded the size limit; skipping the rest");
            break;
        }
    }
    Ok(request)
}

fn exceeds_limit(err: &MultipartError) -> bool {
    err.status() == StatusCode::PAYLOAD_TOO_LARGE
}

fn malformed(err: MultipartError) -> AppError {
    AppError::Validation(format!("Malformed multipart body: {err}"))
}
