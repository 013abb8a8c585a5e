//! Clients for Agent Trail's external collaborators.
//!
//! Two services are spoken to over HTTP: the hosted agent-run service
//! (streaming newline-delimited JSON) and the Anthropic Messages API used to
//! summarize long thought texts for compact display.

pub mod agent_run;
pub mod lines;
pub mod summarize;

pub use agent_run::{event_stream, AgentRunClient, UpstreamStatusError};
pub use lines::{line_stream, LineBuffer};
pub use summarize::{AnthropicSummarizer, Summarizer};
