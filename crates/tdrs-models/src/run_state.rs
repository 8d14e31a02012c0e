use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::strategy::TradingStrategy;

/// Forward-looking horizon for the analysis.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Short,
    #[default]
    Medium,
    Long,
}

impl Horizon {
    /// Number of calendar days this horizon looks ahead.
    pub fn forward_days(&self) -> u32 {
        match self {
            Horizon::Short => 7,
            Horizon::Medium => 30,
            Horizon::Long => 180,
        }
    }
}

/// Speaker tracks in the bull/bear investment debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Bull,
    Bear,
}

/// Speaker tracks in the three-way risk debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskSpeaker {
    Aggressive,
    Conservative,
    Neutral,
}

/// State of the bull/bear investment debate.
///
/// Transcripts are append-only and `count` increments exactly once per
/// speaker turn, so `count <= 2 * max_debate_rounds` always holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvestDebateState {
    pub history: String,
    pub bull_history: String,
    pub bear_history: String,
    pub current_response: String,
    pub count: u32,
    pub latest_speaker: Option<Speaker>,
}

impl InvestDebateState {
    pub fn record(&mut self, speaker: Speaker, response: &str) {
        let track = match speaker {
            Speaker::Bull => &mut self.bull_history,
            Speaker::Bear => &mut self.bear_history,
        };
        track.push_str("\n\n");
        track.push_str(response);
        self.history.push_str("\n\n");
        self.history.push_str(response);
        self.current_response = response.to_string();
        self.latest_speaker = Some(speaker);
        self.count += 1;
    }

    /// Completed full rounds (one bull turn + one bear turn each).
    pub fn completed_rounds(&self) -> u32 {
        self.count / 2
    }
}

/// State of the aggressive/conservative/neutral risk debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskDebateState {
    pub history: String,
    pub aggressive_history: String,
    pub conservative_history: String,
    pub neutral_history: String,
    pub current_response: String,
    pub count: u32,
    pub latest_speaker: Option<RiskSpeaker>,
}

impl RiskDebateState {
    pub fn record(&mut self, speaker: RiskSpeaker, response: &str) {
        let track = match speaker {
            RiskSpeaker::Aggressive => &mut self.aggressive_history,
            RiskSpeaker::Conservative => &mut self.conservative_history,
            RiskSpeaker::Neutral => &mut self.neutral_history,
        };
        track.push_str("\n\n");
        track.push_str(response);
        self.history.push_str("\n\n");
        self.history.push_str(response);
        self.current_response = response.to_string();
        self.latest_speaker = Some(speaker);
        self.count += 1;
    }
}

/// Metadata describing which external data backed a given report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provenance {
    /// Report key this entry backs (e.g., "news_analyst").
    pub report: String,
    pub source: String,
    pub item_count: usize,
    pub window_days: u32,
}

/// Mutable state for a single analysis run.
///
/// Owned exclusively by the orchestrator from run start to run end;
/// never shared across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    pub run_id: Uuid,
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub config: RunConfig,
    /// Analyst name -> free-text report.
    pub reports: BTreeMap<String, String>,
    pub provenance: Vec<Provenance>,
    pub investment_plan: String,
    pub trading_strategy: Option<TradingStrategy>,
    pub invest_debate: InvestDebateState,
    pub risk_debate: RiskDebateState,
    /// Id of the memory record persisted at run end, for outcome back-fill.
    pub memory_id: Option<String>,
}

impl RunState {
    pub fn new(ticker: impl Into<String>, as_of_date: NaiveDate, config: RunConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            ticker: ticker.into(),
            as_of_date,
            config,
            reports: BTreeMap::new(),
            provenance: Vec::new(),
            investment_plan: String::new(),
            trading_strategy: None,
            invest_debate: InvestDebateState::default(),
            risk_debate: RiskDebateState::default(),
            memory_id: None,
        }
    }

    /// Externally visible projection of a finished run.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            ticker: self.ticker.clone(),
            as_of_date: self.as_of_date,
            trading_strategy: self.trading_strategy.clone(),
            investment_plan: self.investment_plan.clone(),
            reports: self.reports.clone(),
            invest_debate: self.invest_debate.clone(),
            risk_debate: self.risk_debate.clone(),
            provenance: self.provenance.clone(),
            memory_id: self.memory_id.clone(),
        }
    }
}

/// The result payload of a completed run, as exposed to external callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub trading_strategy: Option<TradingStrategy>,
    pub investment_plan: String,
    pub reports: BTreeMap<String, String>,
    pub invest_debate: InvestDebateState,
    pub risk_debate: RiskDebateState,
    pub provenance: Vec<Provenance>,
    pub memory_id: Option<String>,
}
