//! Request handlers: run relay, run-record fetch, thought summarization.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use agent_trail_providers::{line_stream, UpstreamStatusError};

use crate::state::GatewayState;

/// Request body for `POST /api/run`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub inputs: RunInputs,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunInputs {
    pub question: String,
}

/// Request body for `POST /api/summarize`.
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub description: String,
}

/// Relay a question to the agent-run service and re-emit its event stream.
///
/// The upstream body is re-emitted as discrete newline-terminated lines: a
/// line is never split across two writes, blank lines are dropped, and a
/// trailing unterminated segment is flushed at end of stream.
pub async fn run_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<RunRequest>,
) -> Response {
    let upstream_config = state.config.upstream();
    let Some(api_key) = upstream_config.resolve_api_key() else {
        error!("Upstream API key is not set");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "API key is not set");
    };
    let Some(client) = state.upstream.as_ref() else {
        error!("Upstream app id is not set");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "App id is not set");
    };

    let version = request
        .version
        .as_deref()
        .unwrap_or(&upstream_config.version);
    let request_id = uuid::Uuid::new_v4();
    info!(%request_id, version, "Relaying question to the agent-run service");

    let response = match client
        .start_run(&request.inputs.question, version, &api_key)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            if let Some(rejected) = e.downcast_ref::<UpstreamStatusError>() {
                warn!(%request_id, status = %rejected.status, "Upstream rejected the run");
                return error_response(
                    rejected.status,
                    &format!(
                        "Agent run API responded with status {}: {}",
                        rejected.status.as_u16(),
                        rejected.body
                    ),
                );
            }
            error!(%request_id, error = %e, "Run request failed");
            return error_response(StatusCode::BAD_GATEWAY, &format!("An error occurred: {e}"));
        }
    };

    state.run_started();
    let guard = ActiveRunGuard(state.clone());

    let body_stream = line_stream(response).filter_map(move |line| {
        let _held = &guard;
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Ok::<Bytes, std::convert::Infallible>(Bytes::from(format!(
                        "{trimmed}\n"
                    ))))
                }
            }
            // The line stream ends after yielding a transport error; the
            // relayed body just closes, leaving already-emitted lines intact.
            Err(e) => {
                warn!(%request_id, error = %e, "Upstream stream error");
                None
            }
        }
    });

    (stream_headers(), Body::from_stream(body_stream)).into_response()
}

/// Fetch the record of a previous run from the agent-run service.
pub async fn get_run_handler(
    State(state): State<Arc<GatewayState>>,
    Path(run_id): Path<String>,
) -> Response {
    let upstream_config = state.config.upstream();
    let Some(api_key) = upstream_config.resolve_api_key() else {
        error!("Upstream API key is not set");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "API key is not set");
    };
    let Some(client) = state.upstream.as_ref() else {
        error!("Upstream app id is not set");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "App id is not set");
    };

    match client.fetch_run(&run_id, &api_key).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => {
            if let Some(rejected) = e.downcast_ref::<UpstreamStatusError>() {
                return error_response(
                    rejected.status,
                    &format!(
                        "Agent run API responded with status {}: {}",
                        rejected.status.as_u16(),
                        rejected.body
                    ),
                );
            }
            error!(error = %e, "Run record fetch failed");
            error_response(StatusCode::BAD_GATEWAY, &format!("An error occurred: {e}"))
        }
    }
}

/// Summarize one generation's thought text to a short phrase.
pub async fn summarize_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<SummarizeRequest>,
) -> Response {
    let Some(summarizer) = state.summarizer.as_ref() else {
        error!("Summarizer API key is not set");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "API key not configured");
    };

    match summarizer.summarize(&request.description).await {
        Ok(summary) => Json(json!({ "summary": summary })).into_response(),
        Err(e) => {
            error!(error = %e, "Summarization failed");
            error_response(StatusCode::BAD_GATEWAY, &format!("An error occurred: {e}"))
        }
    }
}

fn stream_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Decrements the active-run counter when the relayed body is dropped,
/// whether the stream completed or the caller disconnected mid-run.
struct ActiveRunGuard(Arc<GatewayState>);

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.0.run_finished();
    }
}
