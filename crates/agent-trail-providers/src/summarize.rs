//! Thought summarization via the Anthropic Messages API.
//!
//! Long generation thoughts are condensed to a short phrase for the compact
//! timeline view. One non-streaming Messages call per thought; the length cap
//! comes from `max_tokens`, not post-processing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use agent_trail_core::config::SummarizerConfig;

const SUMMARY_INSTRUCTION: &str = "Summarize the following text in 5 words or less, \
stating the action the agent took. Respond with the summary only, no other text.";

/// Produces short summaries of generation thought texts.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, description: &str) -> anyhow::Result<String>;
}

/// [`Summarizer`] backed by the Anthropic Messages API.
pub struct AnthropicSummarizer {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicSummarizer {
    pub fn new(api_key: String) -> Self {
        let defaults = SummarizerConfig::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Build a summarizer from the `summarizer` config section.
    pub fn from_config(config: &SummarizerConfig) -> anyhow::Result<Self> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| anyhow::anyhow!("summarizer API key is not configured"))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    async fn summarize(&self, description: &str) -> anyhow::Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".into(),
                content: format!("{SUMMARY_INSTRUCTION}\n\n{description}"),
            }],
        };

        debug!(model = %self.model, "Requesting thought summary");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Summarizer API error {status}: {body}");
        }

        let body: MessagesResponse = response.json().await?;
        body.content
            .iter()
            .find(|block| block.block_type == "text")
            .map(|block| block.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Unexpected response shape from summarizer"))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}
