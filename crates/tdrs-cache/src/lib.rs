pub mod context;
pub mod ttl;

pub use context::RunContext;
pub use ttl::{memo_key, TtlCache};
