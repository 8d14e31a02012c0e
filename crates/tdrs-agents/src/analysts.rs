use tdrs_cache::{RunContext, TtlCache};
use tdrs_models::run_state::{Provenance, RunState};
use tracing::{info, warn};

use crate::feed::{data_is_empty, fetch_shared, item_count, DataFeed, DataKind};
use crate::llm::ModelClient;
use crate::prompts;

/// The analyst team. Each member produces one free-text report from one
/// dataset. Steps run sequentially; a failure degrades that report only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalystKind {
    Fundamental,
    Technical,
    News,
    Social,
}

impl AnalystKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnalystKind::Fundamental => "fundamental_analyst",
            AnalystKind::Technical => "technical_analyst",
            AnalystKind::News => "news_analyst",
            AnalystKind::Social => "social_analyst",
        }
    }

    pub fn data_kind(&self) -> DataKind {
        match self {
            AnalystKind::Fundamental => DataKind::Fundamentals,
            AnalystKind::Technical => DataKind::PriceHistory,
            AnalystKind::News => DataKind::News,
            AnalystKind::Social => DataKind::Social,
        }
    }

    /// The analysts that run for a given configuration, in execution order.
    pub fn roster(social_on: bool) -> Vec<AnalystKind> {
        let mut roster = vec![
            AnalystKind::Fundamental,
            AnalystKind::Technical,
            AnalystKind::News,
        ];
        if social_on {
            roster.push(AnalystKind::Social);
        }
        roster
    }
}

/// Run one analyst step: fetch its dataset (context -> cache -> feed),
/// produce a report, and record provenance. Model or data failures
/// degrade the report text; they never abort the run.
pub async fn run_analyst(
    kind: AnalystKind,
    client: &ModelClient,
    feed: &dyn DataFeed,
    cache: &TtlCache,
    ctx: &mut RunContext,
    state: &mut RunState,
    data_ttl_seconds: u64,
) {
    let data_kind = kind.data_kind();
    let data = fetch_shared(
        feed,
        cache,
        ctx,
        data_kind,
        &state.ticker,
        state.as_of_date,
        data_ttl_seconds,
    )
    .await;

    state.provenance.push(Provenance {
        report: kind.name().to_string(),
        source: data_kind.as_str().to_string(),
        item_count: item_count(&data),
        window_days: data_kind.window_days(),
    });

    if data_is_empty(&data) {
        info!(analyst = kind.name(), ticker = %state.ticker, "No data; writing placeholder report");
        state.reports.insert(
            kind.name().to_string(),
            format!(
                "{} data for {} is unavailable as of {}. No report could be produced; \
                 weigh this absence when judging the debate.",
                data_kind.as_str(),
                state.ticker,
                state.as_of_date
            ),
        );
        return;
    }

    let horizon_days = state.config.horizon.forward_days();
    let prompt = match kind {
        AnalystKind::Fundamental => {
            prompts::fundamental_prompt(&state.ticker, state.as_of_date, horizon_days, &data)
        }
        AnalystKind::Technical => {
            prompts::technical_prompt(&state.ticker, state.as_of_date, horizon_days, &data)
        }
        AnalystKind::News => prompts::news_prompt(&state.ticker, state.as_of_date, &data),
        AnalystKind::Social => prompts::social_prompt(&state.ticker, state.as_of_date, &data),
    };

    let report = match client.invoke(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(analyst = kind.name(), error = %e, "Analyst model call failed; degrading report");
            format!(
                "{} analysis for {} could not be completed ({e}). \
                 Proceeding without this perspective.",
                kind.name(),
                state.ticker
            )
        }
    };

    info!(analyst = kind.name(), chars = report.len(), "Analyst report ready");
    state.reports.insert(kind.name().to_string(), report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EmptyFeed, MockModel, StaticFeed};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tdrs_models::config::RunConfig;

    fn test_state() -> RunState {
        RunState::new(
            "NVDA",
            NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
            RunConfig::default(),
        )
    }

    #[test]
    fn roster_respects_social_flag() {
        assert_eq!(AnalystKind::roster(false).len(), 3);
        let with_social = AnalystKind::roster(true);
        assert_eq!(with_social.len(), 4);
        assert_eq!(with_social[3], AnalystKind::Social);
    }

    #[tokio::test]
    async fn analyst_writes_report_and_provenance() {
        let client = ModelClient::new(Arc::new(MockModel::new("### Conclusion\nStrong.")), 1);
        let feed = StaticFeed::new().with(
            DataKind::Fundamentals,
            "NVDA",
            serde_json::json!({"pe_ratio": 35.0}),
        );
        let cache = TtlCache::new(100);
        let mut ctx = RunContext::new();
        let mut state = test_state();

        run_analyst(
            AnalystKind::Fundamental,
            &client,
            &feed,
            &cache,
            &mut ctx,
            &mut state,
            0,
        )
        .await;

        assert!(state.reports["fundamental_analyst"].contains("Strong"));
        assert_eq!(state.provenance.len(), 1);
        assert_eq!(state.provenance[0].source, "fundamentals");
    }

    #[tokio::test]
    async fn empty_data_produces_placeholder_without_model_call() {
        let model = MockModel::new("should never be used");
        let counter = model.call_count_handle();
        let client = ModelClient::new(Arc::new(model), 1);
        let cache = TtlCache::new(100);
        let mut ctx = RunContext::new();
        let mut state = test_state();

        run_analyst(
            AnalystKind::News,
            &client,
            &EmptyFeed,
            &cache,
            &mut ctx,
            &mut state,
            0,
        )
        .await;

        let report = &state.reports["news_analyst"];
        assert!(report.contains("unavailable"));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_failure_degrades_report_only() {
        let client = ModelClient::new(Arc::new(MockModel::failing("offline")), 1);
        let feed = StaticFeed::new().with(
            DataKind::News,
            "NVDA",
            serde_json::json!({"articles": [{"title": "beat"}]}),
        );
        let cache = TtlCache::new(100);
        let mut ctx = RunContext::new();
        let mut state = test_state();

        run_analyst(
            AnalystKind::News,
            &client,
            &feed,
            &cache,
            &mut ctx,
            &mut state,
            0,
        )
        .await;

        let report = &state.reports["news_analyst"];
        assert!(report.contains("could not be completed"));
    }
}
