use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tdrs_cache::{memo_key, RunContext, TtlCache};
use tracing::{debug, warn};

use crate::error::FeedError;

/// The datasets analysts can request from external tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Fundamentals,
    PriceHistory,
    News,
    Social,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Fundamentals => "fundamentals",
            DataKind::PriceHistory => "price_history",
            DataKind::News => "news",
            DataKind::Social => "social",
        }
    }

    /// Lookback window (days) the dataset covers, recorded as provenance.
    pub fn window_days(&self) -> u32 {
        match self {
            DataKind::Fundamentals => 90,
            DataKind::PriceHistory => 365,
            DataKind::News => 7,
            DataKind::Social => 7,
        }
    }
}

/// External data tool boundary. Implementations are expected to be
/// idempotent for a fixed as-of date.
#[async_trait]
pub trait DataFeed: Send + Sync {
    async fn fetch(
        &self,
        kind: DataKind,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<serde_json::Value, FeedError>;
}

/// Placeholder dataset recorded when a tool call fails or returns nothing.
pub fn unavailable_placeholder(kind: DataKind, reason: &str) -> serde_json::Value {
    serde_json::json!({
        "unavailable": true,
        "kind": kind.as_str(),
        "reason": reason,
    })
}

/// True for placeholder datasets and for genuinely empty results.
pub fn data_is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(map) => {
            map.is_empty() || map.get("unavailable").and_then(|v| v.as_bool()) == Some(true)
        }
        _ => false,
    }
}

/// Rough item count for provenance (articles, bars, posts).
pub fn item_count(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Array(items) => items.len(),
        serde_json::Value::Object(map) => {
            for field in ["items", "articles", "bars", "posts"] {
                if let Some(serde_json::Value::Array(items)) = map.get(field) {
                    return items.len();
                }
            }
            if data_is_empty(value) {
                0
            } else {
                1
            }
        }
        _ => usize::from(!data_is_empty(value)),
    }
}

/// Read-through fetch: run context first, then the shared TTL cache, then
/// the feed itself. The result (placeholder included) lands in the run
/// context, so one run performs at most one fetch per (kind, ticker).
/// Failures are degraded to a placeholder and never cached cross-run.
pub async fn fetch_shared(
    feed: &dyn DataFeed,
    cache: &TtlCache,
    ctx: &mut RunContext,
    kind: DataKind,
    ticker: &str,
    as_of: NaiveDate,
    ttl_seconds: u64,
) -> serde_json::Value {
    if let Some(value) = ctx.get(kind.as_str(), ticker) {
        debug!(kind = kind.as_str(), ticker, "Run-context hit");
        return value.clone();
    }

    let key = memo_key(kind.as_str(), &(ticker, as_of));
    let fetched: Result<String, FeedError> = cache
        .memoize(&key, ttl_seconds, || async {
            let value = feed.fetch(kind, ticker, as_of).await?;
            serde_json::to_string(&value).map_err(|e| FeedError::Io(e.to_string()))
        })
        .await;

    let value = match fetched {
        Ok(json) => serde_json::from_str(&json)
            .unwrap_or_else(|e| unavailable_placeholder(kind, &e.to_string())),
        Err(e) => {
            warn!(kind = kind.as_str(), ticker, error = %e, "Data tool failed; recording placeholder");
            unavailable_placeholder(kind, &e.to_string())
        }
    };

    ctx.set(kind.as_str(), ticker, value.clone());
    value
}
