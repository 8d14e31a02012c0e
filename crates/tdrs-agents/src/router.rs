use serde::{Deserialize, Serialize};
use tdrs_models::config::RunConfig;
use tdrs_models::run_state::RunState;

/// States of the debate/routing machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysts,
    Bull,
    Bear,
    JudgeInvest,
    Strategy,
    RiskAggressive,
    RiskConservative,
    RiskNeutral,
    JudgeRisk,
    Done,
}

impl Stage {
    /// Display name used in progress events.
    pub fn agent_label(&self) -> &'static str {
        match self {
            Stage::Analysts => "analyst_team",
            Stage::Bull => "bull_researcher",
            Stage::Bear => "bear_researcher",
            Stage::JudgeInvest => "research_manager",
            Stage::Strategy => "strategy_synthesizer",
            Stage::RiskAggressive => "aggressive_risk_analyst",
            Stage::RiskConservative => "conservative_risk_analyst",
            Stage::RiskNeutral => "neutral_risk_analyst",
            Stage::JudgeRisk => "risk_manager",
            Stage::Done => "done",
        }
    }
}

/// Explicit transition table for the debate engine.
///
/// Every branch depends only on loop counters fixed at run start and on
/// counts that increment exactly once per speaker turn, so the machine
/// reaches `Done` in O(max_debate_rounds + max_risk_debate_rounds)
/// transitions regardless of model output.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    max_debate_rounds: u32,
    max_risk_debate_rounds: u32,
    risk_on: bool,
}

impl Router {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            max_debate_rounds: config.max_debate_rounds,
            max_risk_debate_rounds: config.max_risk_debate_rounds,
            risk_on: config.risk_on,
        }
    }

    /// Whether the three-way risk debate runs at all.
    pub fn risk_debate_enabled(&self) -> bool {
        self.risk_on && self.max_risk_debate_rounds > 0
    }

    pub fn next(&self, current: Stage, state: &RunState) -> Stage {
        match current {
            Stage::Analysts => {
                if self.max_debate_rounds == 0 {
                    Stage::JudgeInvest
                } else {
                    Stage::Bull
                }
            }
            Stage::Bull => Stage::Bear,
            Stage::Bear => {
                if state.invest_debate.count < 2 * self.max_debate_rounds {
                    Stage::Bull
                } else {
                    Stage::JudgeInvest
                }
            }
            Stage::JudgeInvest => Stage::Strategy,
            Stage::Strategy => {
                if self.risk_debate_enabled() {
                    Stage::RiskAggressive
                } else {
                    Stage::Done
                }
            }
            Stage::RiskAggressive => Stage::RiskConservative,
            Stage::RiskConservative => Stage::RiskNeutral,
            Stage::RiskNeutral => {
                if state.risk_debate.count < 3 * self.max_risk_debate_rounds {
                    Stage::RiskAggressive
                } else {
                    Stage::JudgeRisk
                }
            }
            Stage::JudgeRisk => Stage::Done,
            Stage::Done => Stage::Done,
        }
    }

    /// Number of agent steps the machine will execute, used for progress
    /// reporting. Analysts are counted individually by the caller.
    pub fn debate_step_total(&self) -> u32 {
        let invest = 2 * self.max_debate_rounds + 1; // turns + judge
        let strategy = 1;
        let risk = if self.risk_debate_enabled() {
            3 * self.max_risk_debate_rounds + 1
        } else {
            0
        };
        invest + strategy + risk
    }
}
