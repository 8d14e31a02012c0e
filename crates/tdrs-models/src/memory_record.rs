use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// Realized (or not-yet-realized) outcome of a stored analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Realized {
        /// Realized profit/loss in percent (negative = loss).
        pnl_pct: f64,
        /// What went right or wrong.
        lesson: String,
    },
}

impl Outcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    pub fn pnl_pct(&self) -> Option<f64> {
        match self {
            Outcome::Pending => None,
            Outcome::Realized { pnl_pct, .. } => Some(*pnl_pct),
        }
    }
}

/// A past analysis as stored in the cross-run memory corpus.
///
/// Records are append-only: created with `Outcome::Pending` at run end and
/// mutated exactly once by the outcome back-fill operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// `TICKER_YYYYMMDD_<uuid prefix>`.
    pub id: String,
    pub ticker: String,
    /// Situation description used as the similarity-search document.
    pub situation: String,
    pub decision: Signal,
    pub rationale: String,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A memory record paired with its similarity to a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    /// Cosine similarity in [-1.0, 1.0]; higher is closer.
    pub similarity: f64,
}
