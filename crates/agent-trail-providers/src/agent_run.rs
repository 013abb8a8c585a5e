//! Client for the hosted agent-run service.
//!
//! A released app is executed via `POST {base_url}/{app_id}/run` with bearer
//! auth; the response body is newline-delimited JSON, one event envelope per
//! line. Past runs can be fetched via `GET {base_url}/{app_id}/run/{run_id}`.

use futures::Stream;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::debug;

use agent_trail_core::config::UpstreamConfig;
use agent_trail_core::event::{parse_line, RunEvent};

use crate::lines::line_stream;

/// The upstream rejected a request with a non-success status.
///
/// Kept as a typed error so the gateway can pass the upstream status through
/// to its own caller.
#[derive(Debug, thiserror::Error)]
#[error("Agent run API error {status}: {body}")]
pub struct UpstreamStatusError {
    pub status: reqwest::StatusCode,
    pub body: String,
}

/// Client for the released-app run API.
pub struct AgentRunClient {
    pub base_url: String,
    pub app_id: String,
    client: reqwest::Client,
}

impl AgentRunClient {
    pub fn new(base_url: &str, app_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a client from the `upstream` config section.
    pub fn from_config(upstream: &UpstreamConfig) -> anyhow::Result<Self> {
        let app_id = upstream
            .app_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow::anyhow!("upstream.app_id is not configured"))?;
        Ok(Self::new(&upstream.base_url, app_id))
    }

    /// Start a run and return the raw streaming response.
    ///
    /// Feed the response to [`event_stream`] for parsed events, or to
    /// [`line_stream`](crate::lines::line_stream) for raw lines.
    pub async fn start_run(
        &self,
        question: &str,
        version: &str,
        api_key: &str,
    ) -> anyhow::Result<reqwest::Response> {
        let url = format!("{}/{}/run", self.base_url, self.app_id);
        debug!(%url, version, "Starting agent run");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&json!({
                "inputs": { "question": question },
                "version": version,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamStatusError { status, body }.into());
        }

        Ok(response)
    }

    /// Fetch the status/result record of a previous run.
    pub async fn fetch_run(&self, run_id: &str, api_key: &str) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}/{}/run/{}", self.base_url, self.app_id, run_id);
        debug!(%url, "Fetching run record");

        let response = self.client.get(&url).bearer_auth(api_key).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamStatusError { status, body }.into());
        }

        Ok(response.json().await?)
    }
}

/// Parse a run response body into a stream of [`RunEvent`]s.
///
/// Malformed and unrecognized lines are dropped (the parser logs them);
/// transport errors are yielded once, then the stream ends.
pub fn event_stream(response: reqwest::Response) -> impl Stream<Item = anyhow::Result<RunEvent>> {
    line_stream(response).filter_map(|line| match line {
        Ok(line) => parse_line(&line).map(Ok),
        Err(e) => Some(Err(e)),
    })
}
