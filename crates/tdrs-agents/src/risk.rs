use rust_decimal::Decimal;
use tdrs_memory::MemoryStore;
use tdrs_models::run_state::{RiskSpeaker, RunState};
use tdrs_models::signal::Signal;
use tdrs_models::strategy::{RiskRating, TradingStrategy};
use tracing::info;

use crate::debate::past_mistakes;
use crate::error::AgentError;
use crate::extract::extract_signal;
use crate::llm::ModelClient;
use crate::prompts;

fn current_strategy(state: &RunState) -> TradingStrategy {
    state
        .trading_strategy
        .clone()
        .unwrap_or_else(|| TradingStrategy::hold("no strategy synthesized"))
}

/// One risk-debate turn. The conservative analyst's opening turn consults
/// past losses; everyone else argues from the transcript alone.
pub async fn risk_speaker_step(
    speaker: RiskSpeaker,
    client: &ModelClient,
    memory: Option<&MemoryStore>,
    similar_k: usize,
    state: &mut RunState,
) -> Result<(), AgentError> {
    let strategy = current_strategy(state);
    let opening = match speaker {
        RiskSpeaker::Aggressive => state.risk_debate.aggressive_history.is_empty(),
        RiskSpeaker::Conservative => state.risk_debate.conservative_history.is_empty(),
        RiskSpeaker::Neutral => state.risk_debate.neutral_history.is_empty(),
    };

    let prompt = match speaker {
        RiskSpeaker::Aggressive => prompts::aggressive_prompt(state, &strategy, opening),
        RiskSpeaker::Conservative => {
            let memory_notes = if opening {
                past_mistakes(memory, similar_k)
            } else {
                None
            };
            prompts::conservative_prompt(state, &strategy, memory_notes.as_deref(), opening)
        }
        RiskSpeaker::Neutral => prompts::neutral_prompt(state, &strategy),
    };

    let response = client.invoke(&prompt).await?;
    state.risk_debate.record(speaker, &response);
    Ok(())
}

/// The Risk Manager judges the three-way debate, issues the final action
/// (it may override the synthesized one, including moving off HOLD), and
/// applies the risk gates as a post-decision clamp.
pub async fn judge_risk(
    client: &ModelClient,
    state: &mut RunState,
    rating: RiskRating,
) -> Result<(), AgentError> {
    let mut strategy = current_strategy(state);
    let original_action = strategy.action;

    let prompt = prompts::risk_judge_prompt(state, &strategy);
    let decision = client.invoke(&prompt).await?;

    let final_action = extract_signal(client, &decision, "risk_judge").await;
    strategy.action = final_action;
    apply_risk_gates(&mut strategy, rating);

    info!(
        ticker = %state.ticker,
        original = %original_action,
        decided = %final_action,
        overrode = original_action != final_action,
        "Risk judge decided"
    );

    state.reports.insert("risk_judge".to_string(), decision);
    state.reports.insert(
        "risk_gate".to_string(),
        format!("Risk debate evaluated. Original: {original_action}, Final: {final_action}"),
    );
    state.trading_strategy = Some(strategy);
    Ok(())
}

/// Single-pass validator used when the risk debate is disabled
/// (legacy mode). Applies the same gates with no model call and no
/// memory queries.
pub fn legacy_validate(state: &mut RunState, rating: RiskRating) {
    let mut strategy = current_strategy(state);
    let note = if strategy.action == Signal::Hold {
        strategy.flatten();
        "No trade action (HOLD). Risk gate made no changes.".to_string()
    } else {
        apply_risk_gates(&mut strategy, rating);
        format!(
            "Legacy risk gate applied (debate disabled). rating={rating:?}, \
             position_size_pct={}.",
            strategy.position_size_pct
        )
    };

    state.reports.insert("risk_gate".to_string(), note);
    state.trading_strategy = Some(strategy);
}

/// Fixed risk gates: position-size cap by rating and default stop/target
/// bounds around the entry price. A clamp, not a veto.
pub fn apply_risk_gates(strategy: &mut TradingStrategy, rating: RiskRating) {
    if strategy.action == Signal::Hold {
        strategy.flatten();
        return;
    }

    let cap = rating.max_position_pct();
    strategy.position_size_pct = if strategy.position_size_pct <= Decimal::ZERO {
        cap
    } else {
        strategy.position_size_pct.min(cap)
    };

    let Some(entry) = strategy.entry_price else {
        return;
    };

    match strategy.action {
        Signal::Buy => {
            if strategy.stop_loss.map_or(true, |stop| stop >= entry) {
                strategy.stop_loss = Some(pct_of(entry, 92));
            }
            if strategy.take_profit.map_or(true, |tp| tp <= entry) {
                strategy.take_profit = Some(pct_of(entry, 112));
            }
        }
        Signal::Sell => {
            if strategy.stop_loss.map_or(true, |stop| stop <= entry) {
                strategy.stop_loss = Some(pct_of(entry, 108));
            }
            if strategy.take_profit.map_or(true, |tp| tp >= entry) {
                strategy.take_profit = Some(pct_of(entry, 88));
            }
        }
        Signal::Hold => unreachable!("handled above"),
    }
}

fn pct_of(entry: Decimal, hundredths: i64) -> Decimal {
    (entry * Decimal::new(hundredths, 2)).round_dp(2)
}

/// Derive a coarse risk rating from daily-return volatility in the price
/// history dataset. Missing or thin data rates as moderate.
pub fn rating_from_price_history(data: Option<&serde_json::Value>) -> RiskRating {
    let closes = data.map(extract_closes).unwrap_or_default();
    if closes.len() < 2 {
        return RiskRating::Moderate;
    }

    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.is_empty() {
        return RiskRating::Moderate;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let daily_vol = variance.sqrt();

    if daily_vol > 0.03 {
        RiskRating::High
    } else if daily_vol > 0.015 {
        RiskRating::Moderate
    } else {
        RiskRating::Low
    }
}

fn extract_closes(data: &serde_json::Value) -> Vec<f64> {
    let bars = data
        .get("bars")
        .and_then(|v| v.as_array())
        .or_else(|| data.as_array());
    if let Some(bars) = bars {
        return bars
            .iter()
            .filter_map(|bar| bar.get("close").and_then(|c| c.as_f64()))
            .collect();
    }
    data.get("closes")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_f64()).collect())
        .unwrap_or_default()
}
