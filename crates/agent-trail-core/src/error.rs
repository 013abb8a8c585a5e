use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentTrailError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Summarize error: {0}")]
    Summarize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentTrailError>;
