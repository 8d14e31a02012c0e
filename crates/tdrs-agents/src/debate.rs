use tdrs_memory::MemoryStore;
use tdrs_models::memory_record::{MemoryRecord, ScoredMemory};
use tdrs_models::run_state::{RunState, Speaker};
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::llm::ModelClient;
use crate::prompts;

/// Compress the run so far into a situation description, used both as the
/// memory similarity query and as the stored document at run end.
pub fn situation_digest(state: &RunState) -> String {
    let mut parts = vec![format!("{} as of {}", state.ticker, state.as_of_date)];
    for (name, text) in &state.reports {
        let snippet: String = text.chars().take(400).collect();
        parts.push(format!("{name}: {snippet}"));
    }
    parts.join("\n")
}

fn format_scored(memories: &[ScoredMemory]) -> String {
    memories
        .iter()
        .map(|m| {
            let outcome = match m.record.outcome.pnl_pct() {
                Some(pnl) => format!("realized {pnl:+.1}%"),
                None => "outcome pending".to_string(),
            };
            format!(
                "- [{}] decided {} ({}): {}",
                m.record.id,
                m.record.decision,
                outcome,
                truncate(&m.record.situation, 200)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_records(records: &[MemoryRecord]) -> String {
    records
        .iter()
        .map(|r| {
            let pnl = r.outcome.pnl_pct().unwrap_or(0.0);
            let lesson = match &r.outcome {
                tdrs_models::memory_record::Outcome::Realized { lesson, .. } => lesson.as_str(),
                _ => "",
            };
            format!(
                "- [{}] decided {} ({pnl:+.1}%): {lesson}",
                r.id, r.decision
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Similar past situations for the bull's opening turn. Memory failures
/// degrade to "no context" rather than aborting the debate.
fn similar_situations(
    memory: Option<&MemoryStore>,
    state: &RunState,
    k: usize,
) -> Option<String> {
    let store = memory?;
    match store.similar(&situation_digest(state), k) {
        Ok(found) if !found.is_empty() => Some(format_scored(&found)),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Memory similarity query failed; debating without context");
            None
        }
    }
}

/// Past losing analyses for the bear's (or conservative analyst's) opening
/// turn.
pub(crate) fn past_mistakes(memory: Option<&MemoryStore>, k: usize) -> Option<String> {
    let store = memory?;
    match store.mistakes(-5.0, k) {
        Ok(found) if !found.is_empty() => Some(format_records(&found)),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Memory mistakes query failed; debating without context");
            None
        }
    }
}

/// One bull turn. Memory is consulted only on the first occurrence of the
/// role; later rounds carry cross-examination instructions instead.
pub async fn bull_step(
    client: &ModelClient,
    memory: Option<&MemoryStore>,
    similar_k: usize,
    state: &mut RunState,
) -> Result<(), AgentError> {
    let rebuttal = !state.invest_debate.bull_history.is_empty();
    let memory_notes = if rebuttal {
        None
    } else {
        similar_situations(memory, state, similar_k)
    };

    let prompt = prompts::bull_prompt(state, memory_notes.as_deref(), rebuttal);
    let response = client.invoke(&prompt).await?;

    state.invest_debate.record(Speaker::Bull, &response);
    debug!(count = state.invest_debate.count, "Bull spoke");
    Ok(())
}

/// One bear turn, mirroring `bull_step` with past mistakes as context.
pub async fn bear_step(
    client: &ModelClient,
    memory: Option<&MemoryStore>,
    similar_k: usize,
    state: &mut RunState,
) -> Result<(), AgentError> {
    let rebuttal = !state.invest_debate.bear_history.is_empty();
    let memory_notes = if rebuttal {
        None
    } else {
        past_mistakes(memory, similar_k)
    };

    let prompt = prompts::bear_prompt(state, memory_notes.as_deref(), rebuttal);
    let response = client.invoke(&prompt).await?;

    state.invest_debate.record(Speaker::Bear, &response);
    debug!(count = state.invest_debate.count, "Bear spoke");
    Ok(())
}

/// The Research Manager judges the transcript and writes the investment
/// plan. Single invocation, no loop.
pub async fn judge_invest(client: &ModelClient, state: &mut RunState) -> Result<(), AgentError> {
    let prompt = prompts::invest_judge_prompt(state);
    let plan = client.invoke(&prompt).await?;
    state.investment_plan = plan;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockModel;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tdrs_memory::NewAnalysis;
    use tdrs_models::config::RunConfig;
    use tdrs_models::memory_record::Outcome;
    use tdrs_models::signal::Signal;

    fn test_state() -> RunState {
        let mut state = RunState::new(
            "NVDA",
            NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
            RunConfig::default(),
        );
        state
            .reports
            .insert("news_analyst".to_string(), "AI demand strong".to_string());
        state
    }

    fn seeded_memory() -> MemoryStore {
        let store = MemoryStore::open_in_memory().unwrap();
        let id = store
            .store(&NewAnalysis {
                ticker: "NVDA".to_string(),
                situation: "NVDA AI demand strong with momentum".to_string(),
                decision: Signal::Buy,
                rationale: "growth".to_string(),
            })
            .unwrap();
        store
            .update_outcome(
                &id,
                &Outcome::Realized {
                    pnl_pct: -8.0,
                    lesson: "chased the top".to_string(),
                },
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn bull_then_bear_updates_debate_state() {
        let client = ModelClient::new(
            Arc::new(
                MockModel::new("unused")
                    .with_rule("Bull Researcher", "Bull Researcher: upside ahead")
                    .with_rule("Bear Researcher", "Bear Researcher: priced for perfection"),
            ),
            1,
        );
        let mut state = test_state();

        bull_step(&client, None, 3, &mut state).await.unwrap();
        bear_step(&client, None, 3, &mut state).await.unwrap();

        assert_eq!(state.invest_debate.count, 2);
        assert!(state.invest_debate.bull_history.contains("upside ahead"));
        assert!(state.invest_debate.bear_history.contains("priced for perfection"));
        assert!(state.invest_debate.history.contains("upside ahead"));
    }

    #[tokio::test]
    async fn memory_queried_only_on_first_bull_turn() {
        let memory = seeded_memory();
        let model = MockModel::new("Bull Researcher: case made");
        let prompts_seen = model.prompts_handle();
        let client = ModelClient::new(Arc::new(model), 1);
        let mut state = test_state();

        bull_step(&client, Some(&memory), 3, &mut state)
            .await
            .unwrap();
        // Force a second bull turn.
        bull_step(&client, Some(&memory), 3, &mut state)
            .await
            .unwrap();

        let prompts = prompts_seen.lock().unwrap();
        assert!(prompts[0].contains("similar past situations"));
        assert!(!prompts[1].contains("similar past situations"));
        assert!(prompts[1].contains("Quote 2-3 specific claims"));
    }

    #[tokio::test]
    async fn bear_sees_past_mistakes() {
        let memory = seeded_memory();
        let model = MockModel::new("Bear Researcher: caution");
        let prompts_seen = model.prompts_handle();
        let client = ModelClient::new(Arc::new(model), 1);
        let mut state = test_state();

        bear_step(&client, Some(&memory), 3, &mut state)
            .await
            .unwrap();

        let prompts = prompts_seen.lock().unwrap();
        assert!(prompts[0].contains("Past mistakes worth remembering"));
        assert!(prompts[0].contains("chased the top"));
    }

    #[tokio::test]
    async fn debate_proceeds_when_memory_store_is_absent() {
        let client = ModelClient::new(Arc::new(MockModel::new("Bull Researcher: fine")), 1);
        let mut state = test_state();
        bull_step(&client, None, 3, &mut state).await.unwrap();
        assert_eq!(state.invest_debate.count, 1);
    }

    #[tokio::test]
    async fn judge_writes_investment_plan() {
        let client = ModelClient::new(
            Arc::new(MockModel::new("Recommendation: BUY. Scale in on dips.")),
            1,
        );
        let mut state = test_state();
        state.invest_debate.record(Speaker::Bull, "Bull: up");
        state.invest_debate.record(Speaker::Bear, "Bear: down");

        judge_invest(&client, &mut state).await.unwrap();
        assert!(state.investment_plan.contains("Recommendation: BUY"));
    }

    #[test]
    fn digest_mentions_ticker_and_reports() {
        let state = test_state();
        let digest = situation_digest(&state);
        assert!(digest.contains("NVDA as of 2026-02-11"));
        assert!(digest.contains("AI demand strong"));
    }
}
