use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tdrs_models::memory_record::{MemoryRecord, Outcome, ScoredMemory};
use tdrs_models::signal::Signal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::embedding::{cosine_similarity, embed};
use crate::error::MemoryError;

const MEMORY_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS memory_records (
    id          TEXT PRIMARY KEY,
    ticker      TEXT NOT NULL,
    situation   TEXT NOT NULL,
    decision    TEXT NOT NULL,
    rationale   TEXT NOT NULL,
    outcome     TEXT NOT NULL,
    pnl_pct     REAL,
    lesson      TEXT,
    embedding   TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memory_ticker ON memory_records(ticker);
CREATE INDEX IF NOT EXISTS idx_memory_created ON memory_records(created_at);
";

/// A completed analysis about to enter the memory corpus.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub ticker: String,
    /// Situation description; becomes the similarity-search document.
    pub situation: String,
    pub decision: Signal,
    pub rationale: String,
}

/// Aggregate statistics over the memory corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate_pct: f64,
    pub average_pnl_pct: f64,
}

/// Persistent, embedding-indexed store of past analyses.
///
/// Append-only log used as the similarity-search corpus: records are
/// created with a pending outcome, back-filled exactly once via
/// `update_outcome`, and never deleted.
///
/// SQLite access is synchronized via `Mutex` since `rusqlite::Connection`
/// is not `Sync`; the store itself is shared across concurrent runs.
pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    pub fn open(path: &str) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(MEMORY_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store. Useful for testing.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(MEMORY_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, MemoryError> {
        self.conn
            .lock()
            .map_err(|e| MemoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    /// Append a new record with a pending outcome. Returns the record id.
    pub fn store(&self, analysis: &NewAnalysis) -> Result<String, MemoryError> {
        let now = Utc::now();
        let id = format!(
            "{}_{}_{}",
            analysis.ticker,
            now.format("%Y%m%d"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let embedding = serde_json::to_string(&embed(&analysis.situation))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO memory_records \
             (id, ticker, situation, decision, rationale, outcome, pnl_pct, lesson, embedding, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', NULL, NULL, ?6, ?7, ?7)",
            rusqlite::params![
                id,
                analysis.ticker,
                analysis.situation,
                analysis.decision.as_str(),
                analysis.rationale,
                embedding,
                now.to_rfc3339(),
            ],
        )?;

        info!(id = %id, ticker = %analysis.ticker, decision = %analysis.decision, "Stored analysis in memory");
        Ok(id)
    }

    /// Fetch a single record by id.
    pub fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, ticker, situation, decision, rationale, outcome, pnl_pct, lesson, created_at, updated_at \
             FROM memory_records WHERE id = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![id], row_to_raw);
        match result {
            Ok(raw) => Ok(Some(raw_to_record(raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(MemoryError::Sqlite(e)),
        }
    }

    /// Nearest-neighbor search over the corpus by embedding similarity.
    ///
    /// Returns up to `k` records in descending similarity order; an empty
    /// corpus yields an empty list, not an error.
    pub fn similar(&self, query_text: &str, k: usize) -> Result<Vec<ScoredMemory>, MemoryError> {
        let query = embed(query_text);

        let scored_raw = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare_cached(
                "SELECT id, ticker, situation, decision, rationale, outcome, pnl_pct, lesson, created_at, updated_at, embedding \
                 FROM memory_records",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    let raw = row_to_raw(row)?;
                    let embedding: String = row.get(10)?;
                    Ok((raw, embedding))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut scored: Vec<ScoredMemory> = Vec::with_capacity(scored_raw.len());
        for (raw, embedding_json) in scored_raw {
            let embedding: Vec<f32> = serde_json::from_str(&embedding_json)?;
            let similarity = cosine_similarity(&query, &embedding);
            scored.push(ScoredMemory {
                record: raw_to_record(raw)?,
                similarity,
            });
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        info!(
            query_len = query_text.len(),
            found = scored.len(),
            "Similarity query over memory corpus"
        );
        Ok(scored)
    }

    /// Back-fill a record's outcome. Idempotent for identical values;
    /// last-write-wins otherwise.
    pub fn update_outcome(&self, id: &str, outcome: &Outcome) -> Result<(), MemoryError> {
        let (label, pnl_pct, lesson) = match outcome {
            Outcome::Pending => ("pending", None, None),
            Outcome::Realized { pnl_pct, lesson } => {
                ("realized", Some(*pnl_pct), Some(lesson.clone()))
            }
        };

        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE memory_records SET outcome = ?2, pnl_pct = ?3, lesson = ?4, updated_at = ?5 \
             WHERE id = ?1",
            rusqlite::params![id, label, pnl_pct, lesson, Utc::now().to_rfc3339()],
        )?;

        if updated == 0 {
            warn!(id = %id, "Outcome update for unknown memory id");
            return Err(MemoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Past analyses that realized a loss of at least `min_loss_pct`
    /// (a negative number), worst first.
    pub fn mistakes(&self, min_loss_pct: f64, n: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, ticker, situation, decision, rationale, outcome, pnl_pct, lesson, created_at, updated_at \
             FROM memory_records WHERE outcome = 'realized' AND pnl_pct <= ?1 \
             ORDER BY pnl_pct ASC LIMIT ?2",
        )?;
        let raws = stmt
            .query_map(rusqlite::params![min_loss_pct, n as i64], row_to_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(raw_to_record).collect()
    }

    /// Past analyses that realized a gain of at least `min_gain_pct`, best first.
    pub fn successes(&self, min_gain_pct: f64, n: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, ticker, situation, decision, rationale, outcome, pnl_pct, lesson, created_at, updated_at \
             FROM memory_records WHERE outcome = 'realized' AND pnl_pct >= ?1 \
             ORDER BY pnl_pct DESC LIMIT ?2",
        )?;
        let raws = stmt
            .query_map(rusqlite::params![min_gain_pct, n as i64], row_to_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(raw_to_record).collect()
    }

    /// Most recent analyses, newest first. Read-only browsing surface.
    pub fn recent(&self, limit: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, ticker, situation, decision, rationale, outcome, pnl_pct, lesson, created_at, updated_at \
             FROM memory_records ORDER BY created_at DESC LIMIT ?1",
        )?;
        let raws = stmt
            .query_map(rusqlite::params![limit as i64], row_to_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(raw_to_record).collect()
    }

    pub fn count(&self) -> Result<usize, MemoryError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memory_records", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    /// Corpus-wide statistics over realized outcomes.
    pub fn stats(&self) -> Result<MemoryStats, MemoryError> {
        let (total, realized): (i64, Vec<f64>) = {
            let conn = self.lock()?;
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM memory_records", [], |row| row.get(0))?;
            let mut stmt = conn.prepare_cached(
                "SELECT pnl_pct FROM memory_records WHERE outcome = 'realized' AND pnl_pct IS NOT NULL",
            )?;
            let pnls = stmt
                .query_map([], |row| row.get::<_, f64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            (total, pnls)
        };

        let completed = realized.len();
        let wins = realized.iter().filter(|p| **p > 0.0).count();
        let win_rate_pct = if completed > 0 {
            wins as f64 / completed as f64 * 100.0
        } else {
            0.0
        };
        let average_pnl_pct = if completed > 0 {
            realized.iter().sum::<f64>() / completed as f64
        } else {
            0.0
        };

        Ok(MemoryStats {
            total: total as usize,
            completed,
            pending: total as usize - completed,
            wins,
            losses: completed - wins,
            win_rate_pct,
            average_pnl_pct,
        })
    }
}

struct RawRow {
    id: String,
    ticker: String,
    situation: String,
    decision: String,
    rationale: String,
    outcome: String,
    pnl_pct: Option<f64>,
    lesson: Option<String>,
    created_at: String,
    updated_at: String,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        ticker: row.get(1)?,
        situation: row.get(2)?,
        decision: row.get(3)?,
        rationale: row.get(4)?,
        outcome: row.get(5)?,
        pnl_pct: row.get(6)?,
        lesson: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn raw_to_record(raw: RawRow) -> Result<MemoryRecord, MemoryError> {
    let decision: Signal = raw
        .decision
        .parse()
        .map_err(|e| MemoryError::Unavailable(format!("corrupt decision column: {e}")))?;

    let outcome = match raw.outcome.as_str() {
        "realized" => Outcome::Realized {
            pnl_pct: raw.pnl_pct.unwrap_or(0.0),
            lesson: raw.lesson.unwrap_or_default(),
        },
        _ => Outcome::Pending,
    };

    Ok(MemoryRecord {
        id: raw.id,
        ticker: raw.ticker,
        situation: raw.situation,
        decision,
        rationale: raw.rationale,
        outcome,
        created_at: parse_timestamp(&raw.created_at)?,
        updated_at: parse_timestamp(&raw.updated_at)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, MemoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemoryError::Unavailable(format!("corrupt timestamp column: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(ticker: &str, situation: &str, decision: Signal) -> NewAnalysis {
        NewAnalysis {
            ticker: ticker.to_string(),
            situation: situation.to_string(),
            decision,
            rationale: "test rationale".to_string(),
        }
    }

    #[test]
    fn store_and_get() {
        let store = MemoryStore::open_in_memory().unwrap();
        let id = store
            .store(&analysis("NVDA", "AI demand surge with strong guidance", Signal::Buy))
            .unwrap();

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.ticker, "NVDA");
        assert_eq!(record.decision, Signal::Buy);
        assert!(record.outcome.is_pending());
        assert!(id.starts_with("NVDA_"));
    }

    #[test]
    fn similar_on_empty_corpus_returns_empty() {
        let store = MemoryStore::open_in_memory().unwrap();
        let results = store.similar("anything", 3).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn similar_ranks_closest_first() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .store(&analysis(
                "NVDA",
                "chip maker earnings beat on AI demand, guidance raised",
                Signal::Buy,
            ))
            .unwrap();
        store
            .store(&analysis(
                "XOM",
                "oil major dividend steady amid crude price weakness",
                Signal::Hold,
            ))
            .unwrap();

        let results = store
            .similar("AI chip demand with earnings beat and raised guidance", 2)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.ticker, "NVDA");
        assert!(results[0].similarity > results[1].similarity);
    }

    #[test]
    fn store_then_update_then_similar_roundtrip() {
        let store = MemoryStore::open_in_memory().unwrap();
        let id = store
            .store(&analysis(
                "TSLA",
                "delivery miss with margin compression",
                Signal::Sell,
            ))
            .unwrap();

        let outcome = Outcome::Realized {
            pnl_pct: 9.3,
            lesson: "short thesis played out".to_string(),
        };
        store.update_outcome(&id, &outcome).unwrap();

        let results = store
            .similar("delivery miss with margin compression", 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.outcome, outcome);
    }

    #[test]
    fn update_outcome_is_idempotent() {
        let store = MemoryStore::open_in_memory().unwrap();
        let id = store
            .store(&analysis("AMD", "datacenter share gains", Signal::Buy))
            .unwrap();

        let outcome = Outcome::Realized {
            pnl_pct: 4.0,
            lesson: "thesis held".to_string(),
        };
        store.update_outcome(&id, &outcome).unwrap();
        store.update_outcome(&id, &outcome).unwrap();

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.outcome, outcome);
    }

    #[test]
    fn update_outcome_unknown_id_errors() {
        let store = MemoryStore::open_in_memory().unwrap();
        let result = store.update_outcome(
            "GHOST_20260101_deadbeef",
            &Outcome::Realized {
                pnl_pct: 1.0,
                lesson: String::new(),
            },
        );
        assert!(matches!(result, Err(MemoryError::NotFound(_))));
    }

    #[test]
    fn mistakes_and_successes_filter_and_sort() {
        let store = MemoryStore::open_in_memory().unwrap();
        let winner = store
            .store(&analysis("NVDA", "AI ramp", Signal::Buy))
            .unwrap();
        let small_loss = store
            .store(&analysis("INTC", "turnaround hopes", Signal::Buy))
            .unwrap();
        let big_loss = store
            .store(&analysis("PTON", "reopening fade", Signal::Buy))
            .unwrap();
        store.store(&analysis("MSFT", "cloud growth", Signal::Buy)).unwrap(); // stays pending

        store
            .update_outcome(
                &winner,
                &Outcome::Realized {
                    pnl_pct: 18.0,
                    lesson: "momentum carried".to_string(),
                },
            )
            .unwrap();
        store
            .update_outcome(
                &small_loss,
                &Outcome::Realized {
                    pnl_pct: -6.0,
                    lesson: "caught a falling knife".to_string(),
                },
            )
            .unwrap();
        store
            .update_outcome(
                &big_loss,
                &Outcome::Realized {
                    pnl_pct: -22.0,
                    lesson: "ignored demand collapse".to_string(),
                },
            )
            .unwrap();

        let mistakes = store.mistakes(-5.0, 5).unwrap();
        assert_eq!(mistakes.len(), 2);
        assert_eq!(mistakes[0].ticker, "PTON"); // worst first
        assert_eq!(mistakes[1].ticker, "INTC");

        let successes = store.successes(5.0, 5).unwrap();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].ticker, "NVDA");
    }

    #[test]
    fn stats_over_corpus() {
        let store = MemoryStore::open_in_memory().unwrap();
        let a = store.store(&analysis("A", "one", Signal::Buy)).unwrap();
        let b = store.store(&analysis("B", "two", Signal::Sell)).unwrap();
        store.store(&analysis("C", "three", Signal::Hold)).unwrap();

        store
            .update_outcome(
                &a,
                &Outcome::Realized {
                    pnl_pct: 10.0,
                    lesson: String::new(),
                },
            )
            .unwrap();
        store
            .update_outcome(
                &b,
                &Outcome::Realized {
                    pnl_pct: -4.0,
                    lesson: String::new(),
                },
            )
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate_pct - 50.0).abs() < 1e-9);
        assert!((stats.average_pnl_pct - 3.0).abs() < 1e-9);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        let path_str = path.to_str().unwrap();

        let id = {
            let store = MemoryStore::open(path_str).unwrap();
            store
                .store(&analysis("NVDA", "persistent situation", Signal::Buy))
                .unwrap()
        };

        let reopened = MemoryStore::open(path_str).unwrap();
        let record = reopened.get(&id).unwrap().unwrap();
        assert_eq!(record.situation, "persistent situation");
    }
}
