pub mod analysts;
pub mod debate;
pub mod error;
pub mod execution;
pub mod extract;
pub mod feed;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod risk;
pub mod router;

pub mod test_support;

pub use analysts::AnalystKind;
pub use error::{AgentError, FeedError, LlmError};
pub use extract::extract_signal;
pub use feed::{DataFeed, DataKind};
pub use llm::{ClaudeCliModel, LanguageModel, ModelClient};
pub use orchestrator::{Orchestrator, ProgressSender};
pub use router::{Router, Stage};
