//! Scripted collaborators for exercising the orchestration core without a
//! live model or data tools.
//!
//! `MockModel` answers by first-matching substring rules against the
//! incoming prompt, which lines up with the role framing each prompt
//! builder emits ("You are the Bull Researcher...", "exactly one word").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{FeedError, LlmError};
use crate::feed::{DataFeed, DataKind};
use crate::llm::LanguageModel;

/// A scripted language model.
pub struct MockModel {
    rules: Vec<(String, String)>,
    default: String,
    fail_message: Option<String>,
    rate_limits_remaining: AtomicU32,
    retry_after: Duration,
    calls: Arc<AtomicU32>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockModel {
    pub fn new(default_response: &str) -> Self {
        Self {
            rules: Vec::new(),
            default: default_response.to_string(),
            fail_message: None,
            rate_limits_remaining: AtomicU32::new(0),
            retry_after: Duration::from_millis(5),
            calls: Arc::new(AtomicU32::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Respond with `response` whenever the prompt contains `pattern`.
    /// Rules are checked in insertion order; first match wins.
    pub fn with_rule(mut self, pattern: &str, response: &str) -> Self {
        self.rules.push((pattern.to_string(), response.to_string()));
        self
    }

    /// Always fail with a terminal model error.
    pub fn failing(message: &str) -> Self {
        let mut model = Self::new("");
        model.fail_message = Some(message.to_string());
        model
    }

    /// Fail with `RateLimited` for the first `times` calls, then answer.
    pub fn rate_limited(times: u32, retry_after: Duration, response: &str) -> Self {
        let mut model = Self::new(response);
        model.rate_limits_remaining = AtomicU32::new(times);
        model.retry_after = retry_after;
        model
    }

    pub fn call_count_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }

    pub fn prompts_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(message) = &self.fail_message {
            return Err(LlmError::Model(message.clone()));
        }

        let remaining = self.rate_limits_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rate_limits_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(LlmError::RateLimited {
                retry_after: Some(self.retry_after),
            });
        }

        for (pattern, response) in &self.rules {
            if prompt.contains(pattern) {
                return Ok(response.clone());
            }
        }
        Ok(self.default.clone())
    }
}

/// A feed serving canned datasets keyed by (kind, ticker). Unknown keys
/// come back as empty objects, matching a tool with nothing to say.
pub struct StaticFeed {
    data: HashMap<(DataKind, String), serde_json::Value>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with(mut self, kind: DataKind, ticker: &str, value: serde_json::Value) -> Self {
        self.data.insert((kind, ticker.to_string()), value);
        self
    }
}

impl Default for StaticFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataFeed for StaticFeed {
    async fn fetch(
        &self,
        kind: DataKind,
        ticker: &str,
        _as_of: NaiveDate,
    ) -> Result<serde_json::Value, FeedError> {
        Ok(self
            .data
            .get(&(kind, ticker.to_string()))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }
}

/// Every dataset exists but is empty.
pub struct EmptyFeed;

#[async_trait]
impl DataFeed for EmptyFeed {
    async fn fetch(
        &self,
        _kind: DataKind,
        _ticker: &str,
        _as_of: NaiveDate,
    ) -> Result<serde_json::Value, FeedError> {
        Ok(serde_json::json!({}))
    }
}

/// Every fetch fails outright.
pub struct FailingFeed;

#[async_trait]
impl DataFeed for FailingFeed {
    async fn fetch(
        &self,
        kind: DataKind,
        ticker: &str,
        _as_of: NaiveDate,
    ) -> Result<serde_json::Value, FeedError> {
        Err(FeedError::Unavailable(format!(
            "{} feed down for {ticker}",
            kind.as_str()
        )))
    }
}

/// Serves one fixed value and counts how often it is actually consulted.
pub struct CountingFeed {
    value: serde_json::Value,
    count: Arc<AtomicU32>,
}

impl CountingFeed {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn count_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.count)
    }
}

#[async_trait]
impl DataFeed for CountingFeed {
    async fn fetch(
        &self,
        _kind: DataKind,
        _ticker: &str,
        _as_of: NaiveDate,
    ) -> Result<serde_json::Value, FeedError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rules_match_in_order() {
        let model = MockModel::new("default")
            .with_rule("Bull", "bull answer")
            .with_rule("Bear", "bear answer");

        assert_eq!(model.complete("You are the Bull").await.unwrap(), "bull answer");
        assert_eq!(model.complete("You are the Bear").await.unwrap(), "bear answer");
        assert_eq!(model.complete("anything else").await.unwrap(), "default");
    }

    #[tokio::test]
    async fn rate_limited_model_recovers() {
        let model = MockModel::rate_limited(1, Duration::from_millis(1), "ok");
        assert!(matches!(
            model.complete("x").await,
            Err(LlmError::RateLimited { .. })
        ));
        assert_eq!(model.complete("x").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn static_feed_serves_known_and_empty() {
        let feed = StaticFeed::new().with(DataKind::News, "NVDA", serde_json::json!({"n": 1}));
        let date = NaiveDate::from_ymd_opt(2026, 2, 11).unwrap();

        let known = feed.fetch(DataKind::News, "NVDA", date).await.unwrap();
        assert_eq!(known["n"], 1);

        let unknown = feed.fetch(DataKind::News, "ZZZZ", date).await.unwrap();
        assert_eq!(unknown, serde_json::json!({}));
    }
}
