//! TDRS - Ticker Debate Recommendation System
//!
//! Turns a ticker and an as-of date into a BUY/SELL/HOLD recommendation by
//! sequencing LLM-backed agents through a bounded debate state machine,
//! with persistent cross-run memory and multi-layer caching.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tdrs::models::config::TdrsConfig;
//! use tdrs::FileFeed;
//!
//! let config = TdrsConfig::default();
//! let feed = Arc::new(FileFeed::new("data/feeds"));
//! let orchestrator = tdrs::build_orchestrator(&config, feed);
//! ```

pub use tdrs_agents as agents;
pub use tdrs_cache as cache;
pub use tdrs_memory as memory;
pub use tdrs_models as models;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tdrs_agents::{ClaudeCliModel, DataFeed, DataKind, FeedError, ModelClient, Orchestrator};
use tdrs_cache::TtlCache;
use tdrs_memory::MemoryStore;
use tdrs_models::config::TdrsConfig;
use tracing::warn;

/// Build an Orchestrator from configuration and a data feed.
///
/// A memory store that cannot be opened degrades to "no memory" rather
/// than failing construction.
pub fn build_orchestrator(config: &TdrsConfig, feed: Arc<dyn DataFeed>) -> Orchestrator {
    let cache = Arc::new(TtlCache::from_config(&config.cache));

    let model = ClaudeCliModel {
        model: config.model.model.clone(),
        timeout: Duration::from_secs(config.model.timeout_seconds),
    };
    let client = ModelClient::new(Arc::new(model), config.model.max_attempts)
        .with_cache(Arc::clone(&cache), config.cache.llm_ttl_seconds);

    let memory = match MemoryStore::open(&config.memory.sqlite_path) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!(path = %config.memory.sqlite_path, error = %e, "Memory store unavailable; running without memory");
            None
        }
    };

    Orchestrator::new(client, feed, cache, memory, config.clone())
}

/// Data feed reading frozen JSON snapshots from disk.
///
/// Layout: `<root>/<TICKER>/<kind>.json` (e.g. `data/feeds/NVDA/news.json`).
/// A missing file is an empty dataset, not an error; snapshots are assumed
/// to already be frozen at the desired as-of date.
pub struct FileFeed {
    root: PathBuf,
}

impl FileFeed {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DataFeed for FileFeed {
    async fn fetch(
        &self,
        kind: DataKind,
        ticker: &str,
        _as_of: NaiveDate,
    ) -> Result<serde_json::Value, FeedError> {
        let path = self
            .root
            .join(ticker)
            .join(format!("{}.json", kind.as_str()));

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| FeedError::Io(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::json!({})),
            Err(e) => Err(FeedError::Io(format!("{}: {e}", path.display()))),
        }
    }
}
