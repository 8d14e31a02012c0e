use serde::{Deserialize, Serialize};

use crate::run_state::Horizon;

/// Top-level configuration for TDRS.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TdrsConfig {
    pub model: ModelConfig,
    pub cache: CacheConfig,
    pub memory: MemoryConfig,
    pub run: RunConfig,
}

/// Configuration for the language model boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    /// Per-invocation timeout in seconds.
    pub timeout_seconds: u64,
    /// Total attempts per invocation (first try + retries on rate limits).
    pub max_attempts: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout_seconds: 45,
            max_attempts: 3,
        }
    }
}

/// Configuration for the process-wide TTL cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries held in memory.
    pub max_capacity: u64,
    /// TTL in seconds for cached data-tool results. 0 = never expire.
    pub data_ttl_seconds: u64,
    /// TTL in seconds for cached model responses. 0 = never expire.
    pub llm_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            data_ttl_seconds: 3_600,
            llm_ttl_seconds: 86_400,
        }
    }
}

/// Configuration for the persistent memory store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    pub sqlite_path: String,
    /// How many similar past analyses to surface per query.
    pub similar_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/tdrs_memory.db".to_string(),
            similar_k: 3,
        }
    }
}

/// Run-level feature flags and loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub horizon: Horizon,
    /// Consult the memory store during debates and persist the run result.
    pub memory_on: bool,
    /// Run the three-way risk debate. Off = legacy single-pass validator.
    pub risk_on: bool,
    /// Run the social sentiment analyst.
    pub social_on: bool,
    /// Bull/bear rounds; one round = 2 exchanges. 0 skips straight to the judge.
    pub max_debate_rounds: u32,
    /// Risk rounds; one round = 3 exchanges.
    pub max_risk_debate_rounds: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            horizon: Horizon::Medium,
            memory_on: true,
            risk_on: true,
            social_on: false,
            max_debate_rounds: 2,
            max_risk_debate_rounds: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_tdrs_config() {
        let config = TdrsConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TdrsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn default_run_config_bounds() {
        let run = RunConfig::default();
        assert_eq!(run.max_debate_rounds, 2);
        assert_eq!(run.max_risk_debate_rounds, 1);
        assert!(run.memory_on);
        assert!(run.risk_on);
        assert!(!run.social_on);
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[model]
model = "claude-sonnet-4-5-20250929"
timeout_seconds = 60
max_attempts = 5

[cache]
max_capacity = 5000
data_ttl_seconds = 1800
llm_ttl_seconds = 0

[memory]
sqlite_path = "/tmp/test_memory.db"
similar_k = 5

[run]
horizon = "long"
memory_on = true
risk_on = false
social_on = true
max_debate_rounds = 3
max_risk_debate_rounds = 2
"#;

        let config: TdrsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.max_attempts, 5);
        assert_eq!(config.cache.llm_ttl_seconds, 0);
        assert_eq!(config.memory.similar_k, 5);
        assert_eq!(config.run.horizon, Horizon::Long);
        assert!(!config.run.risk_on);
        assert_eq!(config.run.max_debate_rounds, 3);
    }
}
