use std::sync::Arc;

use chrono::NaiveDate;
use tdrs_cache::{RunContext, TtlCache};
use tdrs_memory::{MemoryStore, NewAnalysis};
use tdrs_models::config::{RunConfig, TdrsConfig};
use tdrs_models::progress::ProgressEvent;
use tdrs_models::run_state::{RiskSpeaker, RunState, RunSummary};
use tdrs_models::strategy::TradingStrategy;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::analysts::{run_analyst, AnalystKind};
use crate::debate::{bear_step, bull_step, judge_invest, situation_digest};
use crate::error::AgentError;
use crate::execution::synthesize_strategy;
use crate::feed::{DataFeed, DataKind};
use crate::llm::ModelClient;
use crate::risk::{judge_risk, legacy_validate, rating_from_price_history, risk_speaker_step};
use crate::router::{Router, Stage};

pub type ProgressSender = UnboundedSender<ProgressEvent>;

struct ProgressReporter {
    tx: Option<ProgressSender>,
    step: u32,
    total: u32,
}

impl ProgressReporter {
    fn new(tx: Option<ProgressSender>, total: u32) -> Self {
        Self { tx, step: 0, total }
    }

    fn processing(&mut self, agent: &str) {
        self.step += 1;
        self.send(ProgressEvent::Processing {
            agent: agent.to_string(),
            step: self.step,
            total: self.total,
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}

/// Drives one analysis run end-to-end: fresh state and run context, the
/// router walk, memory persistence, and the progress stream.
///
/// The cache and memory store are process-wide and shared across
/// concurrent runs; everything else here is per-run.
pub struct Orchestrator {
    client: ModelClient,
    feed: Arc<dyn DataFeed>,
    cache: Arc<TtlCache>,
    memory: Option<Arc<MemoryStore>>,
    config: TdrsConfig,
}

impl Orchestrator {
    pub fn new(
        client: ModelClient,
        feed: Arc<dyn DataFeed>,
        cache: Arc<TtlCache>,
        memory: Option<Arc<MemoryStore>>,
        config: TdrsConfig,
    ) -> Self {
        Self {
            client,
            feed,
            cache,
            memory,
            config,
        }
    }

    /// Run one analysis. Emits ordered progress events when a sender is
    /// given; the stream always ends with exactly one `complete` or
    /// `error`, never both.
    pub async fn run(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        run_config: RunConfig,
        progress: Option<ProgressSender>,
    ) -> Result<RunSummary, AgentError> {
        info!(ticker, %as_of, "Starting analysis run");

        let router = Router::from_config(&run_config);
        let analyst_steps = AnalystKind::roster(run_config.social_on).len() as u32;
        let total = analyst_steps + router.debate_step_total();
        let mut reporter = ProgressReporter::new(progress, total);

        match self
            .run_inner(ticker, as_of, run_config, router, &mut reporter)
            .await
        {
            Ok(summary) => {
                reporter.send(ProgressEvent::Complete {
                    result: Box::new(summary.clone()),
                });
                Ok(summary)
            }
            Err(e) => {
                error!(ticker, error = %e, "Run aborted");
                reporter.send(ProgressEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        run_config: RunConfig,
        router: Router,
        reporter: &mut ProgressReporter,
    ) -> Result<RunSummary, AgentError> {
        let mut state = RunState::new(ticker, as_of, run_config.clone());
        // One context per run, reset at start; never reused across runs.
        let mut ctx = RunContext::new();
        ctx.reset();

        let memory = if run_config.memory_on {
            self.memory.as_deref()
        } else {
            None
        };
        let similar_k = self.config.memory.similar_k;
        let data_ttl = self.config.cache.data_ttl_seconds;

        let mut stage = Stage::Analysts;
        while stage != Stage::Done {
            match stage {
                Stage::Analysts => {
                    for kind in AnalystKind::roster(run_config.social_on) {
                        reporter.processing(kind.name());
                        run_analyst(
                            kind,
                            &self.client,
                            self.feed.as_ref(),
                            &self.cache,
                            &mut ctx,
                            &mut state,
                            data_ttl,
                        )
                        .await;
                    }
                }
                Stage::Bull => {
                    reporter.processing(stage.agent_label());
                    bull_step(&self.client, memory, similar_k, &mut state).await?;
                }
                Stage::Bear => {
                    reporter.processing(stage.agent_label());
                    bear_step(&self.client, memory, similar_k, &mut state).await?;
                }
                Stage::JudgeInvest => {
                    reporter.processing(stage.agent_label());
                    judge_invest(&self.client, &mut state).await?;
                }
                Stage::Strategy => {
                    reporter.processing(stage.agent_label());
                    synthesize_strategy(&self.client, &mut state).await?;
                }
                Stage::RiskAggressive => {
                    reporter.processing(stage.agent_label());
                    risk_speaker_step(
                        RiskSpeaker::Aggressive,
                        &self.client,
                        memory,
                        similar_k,
                        &mut state,
                    )
                    .await?;
                }
                Stage::RiskConservative => {
                    reporter.processing(stage.agent_label());
                    risk_speaker_step(
                        RiskSpeaker::Conservative,
                        &self.client,
                        memory,
                        similar_k,
                        &mut state,
                    )
                    .await?;
                }
                Stage::RiskNeutral => {
                    reporter.processing(stage.agent_label());
                    risk_speaker_step(
                        RiskSpeaker::Neutral,
                        &self.client,
                        memory,
                        similar_k,
                        &mut state,
                    )
                    .await?;
                }
                Stage::JudgeRisk => {
                    reporter.processing(stage.agent_label());
                    let rating = rating_from_price_history(
                        ctx.get(DataKind::PriceHistory.as_str(), ticker),
                    );
                    judge_risk(&self.client, &mut state, rating).await?;
                }
                Stage::Done => unreachable!("loop exits before Done executes"),
            }

            let next = router.next(stage, &state);
            if stage == Stage::Strategy && next == Stage::Done {
                // Risk debate disabled: run the single-pass validator on
                // the way out.
                let rating =
                    rating_from_price_history(ctx.get(DataKind::PriceHistory.as_str(), ticker));
                legacy_validate(&mut state, rating);
            }
            stage = next;
        }

        reporter.send(ProgressEvent::Executing);

        if run_config.memory_on {
            if let Some(store) = self.memory.as_deref() {
                self.persist_run(store, &mut state);
            }
        }

        let action = state.trading_strategy.as_ref().map(|s| s.action);
        info!(ticker = %state.ticker, ?action, debate_turns = state.invest_debate.count, "Run complete");
        Ok(state.summary())
    }

    fn persist_run(&self, store: &MemoryStore, state: &mut RunState) {
        let strategy = state
            .trading_strategy
            .clone()
            .unwrap_or_else(|| TradingStrategy::hold("no strategy synthesized"));

        let analysis = NewAnalysis {
            ticker: state.ticker.clone(),
            situation: situation_digest(state),
            decision: strategy.action,
            rationale: strategy.rationale,
        };

        match store.store(&analysis) {
            Ok(id) => state.memory_id = Some(id),
            Err(e) => {
                // Memory is an enhancement, never a run-fatal dependency.
                warn!(error = %e, "Failed to persist run to memory");
            }
        }
    }
}
