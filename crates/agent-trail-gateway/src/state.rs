//! Gateway shared state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use agent_trail_core::config::Config;
use agent_trail_providers::{AgentRunClient, AnthropicSummarizer, Summarizer};

/// Shared gateway state accessible from all request handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Upstream run client; `None` when no app id is configured.
    pub upstream: Option<AgentRunClient>,
    /// Thought summarizer; `None` when no summarizer key is configured.
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub started_at: DateTime<Utc>,
    pub runs_started: AtomicU64,
    pub runs_active: AtomicU64,
}

impl GatewayState {
    pub fn new(config: Arc<Config>) -> Self {
        let upstream = match AgentRunClient::from_config(&config.upstream()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "Upstream client unavailable; run requests will be rejected");
                None
            }
        };

        let summarizer: Option<Arc<dyn Summarizer>> =
            match AnthropicSummarizer::from_config(&config.summarizer()) {
                Ok(summarizer) => Some(Arc::new(summarizer)),
                Err(e) => {
                    warn!(error = %e, "Summarizer unavailable; /api/summarize will return 500");
                    None
                }
            };

        Self {
            config,
            upstream,
            summarizer,
            started_at: Utc::now(),
            runs_started: AtomicU64::new(0),
            runs_active: AtomicU64::new(0),
        }
    }

    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::SeqCst);
        self.runs_active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn run_finished(&self) {
        self.runs_active.fetch_sub(1, Ordering::SeqCst);
    }
}
