use std::time::Duration;

use thiserror::Error;

/// Failure modes at the language model boundary.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Recoverable: the provider asked us to slow down. Carries the
    /// server-suggested delay when one could be parsed.
    #[error("rate limited (retry_after: {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Terminal for this invocation.
    #[error("model error: {0}")]
    Model(String),

    #[error("model timed out after {0} seconds")]
    Timeout(u64),
}

/// Failure modes at the data tool boundary. Never fatal to a run.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("data unavailable: {0}")]
    Unavailable(String),

    #[error("feed I/O error: {0}")]
    Io(String),
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("model invocation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("memory error: {0}")]
    Memory(#[from] tdrs_memory::MemoryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
