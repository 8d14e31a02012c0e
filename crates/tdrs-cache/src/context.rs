use std::collections::HashMap;

/// Per-run scratch store deduplicating data fetches within one analysis.
///
/// Keyed by (data kind, ticker) so agents in the same run never re-fetch
/// an identical dataset. One instance per run, owned by the orchestrator;
/// `reset` is called at run start. This is NOT a cross-run cache - that
/// role belongs to `TtlCache`.
#[derive(Debug, Default)]
pub struct RunContext {
    data: HashMap<(String, String), serde_json::Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: &str, ticker: &str, value: serde_json::Value) {
        self.data
            .insert((kind.to_string(), ticker.to_string()), value);
    }

    pub fn get(&self, kind: &str, ticker: &str) -> Option<&serde_json::Value> {
        self.data.get(&(kind.to_string(), ticker.to_string()))
    }

    pub fn has(&self, kind: &str, ticker: &str) -> bool {
        self.data
            .contains_key(&(kind.to_string(), ticker.to_string()))
    }

    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
