use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tdrs_cache::{memo_key, TtlCache};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::LlmError;

/// The sole I/O boundary for all reasoning steps: prompt in, text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Language model backed by the `claude` CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCliModel {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliModel {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(45),
        }
    }
}

#[async_trait]
impl LanguageModel for ClaudeCliModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(model = %self.model, "Invoking claude CLI");

        let result = tokio::time::timeout(self.timeout, async {
            Command::new("claude")
                .args([
                    "-p",
                    prompt,
                    "--model",
                    &self.model,
                    "--output-format",
                    "text",
                ])
                .output()
                .await
        })
        .await
        .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| LlmError::Model(format!("Failed to spawn claude: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            if is_rate_limit(&stderr) {
                warn!(stderr = %stderr, "Claude CLI rate limited");
                return Err(LlmError::RateLimited {
                    retry_after: parse_retry_after(&stderr),
                });
            }
            warn!(status = %result.status, stderr = %stderr, "Claude CLI failed");
            return Err(LlmError::Model(format!(
                "claude exited {}: {}",
                result.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&result.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(LlmError::Model("Claude returned empty response".to_string()));
        }

        Ok(stdout)
    }
}

fn is_rate_limit(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit")
}

/// Parse a server-suggested delay like "retry after 12 seconds" or
/// "retry-after: 12" out of an error message.
fn parse_retry_after(text: &str) -> Option<Duration> {
    let lower = text.to_lowercase();
    let idx = lower.find("retry")?;
    let tail = &lower[idx..];
    let digits: String = tail
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let seconds: u64 = digits.parse().ok()?;
    Some(Duration::from_secs(seconds))
}

/// Retrying, caching wrapper around a language model.
///
/// Every agent step calls the model through here. On `RateLimited` the
/// client sleeps (server-suggested delay, or exponential fallback) and
/// retries up to `max_attempts` total tries before propagating. Other
/// errors are terminal for the invocation. Responses are memoized in the
/// shared TTL cache when one is attached.
pub struct ModelClient {
    model: Arc<dyn LanguageModel>,
    cache: Option<Arc<TtlCache>>,
    llm_ttl_seconds: u64,
    max_attempts: u32,
}

impl ModelClient {
    pub fn new(model: Arc<dyn LanguageModel>, max_attempts: u32) -> Self {
        Self {
            model,
            cache: None,
            llm_ttl_seconds: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_cache(mut self, cache: Arc<TtlCache>, ttl_seconds: u64) -> Self {
        self.cache = Some(cache);
        self.llm_ttl_seconds = ttl_seconds;
        self
    }

    pub async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        let key = memo_key("llm", &prompt);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                debug!(prompt_len = prompt.len(), "LLM cache hit");
                return Ok(hit);
            }
        }

        let text = self.invoke_with_retry(prompt).await?;

        if let Some(cache) = &self.cache {
            cache
                .insert(key, text.clone(), self.llm_ttl_seconds)
                .await;
        }
        Ok(text)
    }

    async fn invoke_with_retry(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 1u32;
        loop {
            match self.model.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(LlmError::RateLimited { retry_after }) if attempt < self.max_attempts => {
                    let delay = retry_after
                        .unwrap_or_else(|| Duration::from_secs(2u64.saturating_pow(attempt)));
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
