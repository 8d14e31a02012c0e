use rust_decimal::Decimal;
use tdrs_models::run_state::RunState;
use tdrs_models::signal::Signal;
use tdrs_models::strategy::TradingStrategy;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::extract::{extract_signal, first_json_object};
use crate::llm::ModelClient;
use crate::prompts;

/// Synthesize the Research Manager's free-text plan into a structured
/// trading strategy. A parse failure falls back to the signal extractor
/// for the action and carries the plan text as rationale.
pub async fn synthesize_strategy(
    client: &ModelClient,
    state: &mut RunState,
) -> Result<(), AgentError> {
    let prompt = prompts::strategy_prompt(&state.investment_plan);
    let response = client.invoke(&prompt).await?;

    let mut strategy = match first_json_object(&response)
        .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
    {
        Some(value) => strategy_from_json(&value, &response),
        None => {
            warn!(ticker = %state.ticker, "Strategy output had no parseable JSON; using extractor fallback");
            let action = extract_signal(client, &state.investment_plan, "strategy_synthesis").await;
            TradingStrategy {
                action,
                entry_price: None,
                take_profit: None,
                stop_loss: None,
                position_size_pct: Decimal::ZERO,
                rationale: response.trim().to_string(),
            }
        }
    };

    if strategy.action == Signal::Hold {
        strategy.flatten();
    }

    info!(ticker = %state.ticker, action = %strategy.action, "Strategy synthesized");
    state.trading_strategy = Some(strategy);
    Ok(())
}

fn strategy_from_json(value: &serde_json::Value, raw: &str) -> TradingStrategy {
    let action = value
        .get("action")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(Signal::Hold);

    TradingStrategy {
        action,
        entry_price: decimal_field(value, "entry_price"),
        take_profit: decimal_field(value, "take_profit"),
        stop_loss: decimal_field(value, "stop_loss"),
        position_size_pct: decimal_field(value, "position_size_pct").unwrap_or(Decimal::ZERO),
        rationale: value
            .get("rationale")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| raw.trim())
            .to_string(),
    }
}

fn decimal_field(value: &serde_json::Value, field: &str) -> Option<Decimal> {
    let v = value.get(field)?;
    if let Some(n) = v.as_f64() {
        return Decimal::from_f64_retain(n).map(|d| d.round_dp(4));
    }
    v.as_str().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockModel;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tdrs_models::config::RunConfig;

    fn test_state(plan: &str) -> RunState {
        let mut state = RunState::new(
            "NVDA",
            NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
            RunConfig::default(),
        );
        state.investment_plan = plan.to_string();
        state
    }

    #[tokio::test]
    async fn parses_well_formed_strategy_json() {
        let response = r#"```json
{"action": "BUY", "entry_price": 900.0, "take_profit": 1008.0, "stop_loss": 828.0, "position_size_pct": 20, "rationale": "momentum with support"}
```"#;
        let client = ModelClient::new(Arc::new(MockModel::new(response)), 1);
        let mut state = test_state("BUY with conviction");

        synthesize_strategy(&client, &mut state).await.unwrap();

        let strategy = state.trading_strategy.unwrap();
        assert_eq!(strategy.action, Signal::Buy);
        assert_eq!(strategy.entry_price, Some(dec!(900.0)));
        assert_eq!(strategy.take_profit, Some(dec!(1008.0)));
        assert_eq!(strategy.position_size_pct, dec!(20));
        assert_eq!(strategy.rationale, "momentum with support");
    }

    #[tokio::test]
    async fn hold_strategy_is_flattened_even_with_prices() {
        let response = r#"{"action": "HOLD", "entry_price": 900.0, "position_size_pct": 10, "rationale": "mixed"}"#;
        let client = ModelClient::new(Arc::new(MockModel::new(response)), 1);
        let mut state = test_state("unclear picture");

        synthesize_strategy(&client, &mut state).await.unwrap();

        let strategy = state.trading_strategy.unwrap();
        assert_eq!(strategy.action, Signal::Hold);
        assert!(strategy.entry_price.is_none());
        assert_eq!(strategy.position_size_pct, Decimal::ZERO);
    }

    #[tokio::test]
    async fn unparseable_output_falls_back_to_extractor() {
        // First call returns prose; the extractor's model stage then sees
        // the constrained prompt and answers SELL.
        let client = ModelClient::new(
            Arc::new(
                MockModel::new("I would reduce exposure here, frankly.")
                    .with_rule("exactly one word", "SELL"),
            ),
            1,
        );
        let mut state = test_state("reduce exposure given margin risk");

        synthesize_strategy(&client, &mut state).await.unwrap();

        let strategy = state.trading_strategy.unwrap();
        assert_eq!(strategy.action, Signal::Sell);
        assert!(strategy.entry_price.is_none());
        assert!(strategy.rationale.contains("reduce exposure"));
    }

    #[tokio::test]
    async fn string_prices_are_accepted() {
        let response =
            r#"{"action": "SELL", "entry_price": "200.50", "position_size_pct": "8", "rationale": "fade"}"#;
        let client = ModelClient::new(Arc::new(MockModel::new(response)), 1);
        let mut state = test_state("fade the rally");

        synthesize_strategy(&client, &mut state).await.unwrap();

        let strategy = state.trading_strategy.unwrap();
        assert_eq!(strategy.entry_price, Some(dec!(200.50)));
        assert_eq!(strategy.position_size_pct, dec!(8));
    }
}
