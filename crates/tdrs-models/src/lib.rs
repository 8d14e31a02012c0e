pub mod config;
pub mod memory_record;
pub mod progress;
pub mod run_state;
pub mod signal;
pub mod strategy;

pub use config::{CacheConfig, MemoryConfig, ModelConfig, RunConfig, TdrsConfig};
pub use memory_record::{MemoryRecord, Outcome, ScoredMemory};
pub use progress::ProgressEvent;
pub use run_state::{
    Horizon, InvestDebateState, Provenance, RiskDebateState, RiskSpeaker, RunState, RunSummary,
    Speaker,
};
pub use signal::{ParseSignalError, Signal};
pub use strategy::{RiskRating, TradingStrategy};
