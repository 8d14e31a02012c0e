use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// The structured trading plan synthesized from the investment plan and
/// finalized (possibly overridden) by the risk judge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingStrategy {
    pub action: Signal,
    /// Suggested entry price. None for HOLD.
    pub entry_price: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    /// Position size as a percentage of portfolio. Zero for HOLD.
    pub position_size_pct: Decimal,
    pub rationale: String,
}

impl TradingStrategy {
    /// A flat HOLD strategy carrying the given rationale text.
    pub fn hold(rationale: impl Into<String>) -> Self {
        Self {
            action: Signal::Hold,
            entry_price: None,
            take_profit: None,
            stop_loss: None,
            position_size_pct: Decimal::ZERO,
            rationale: rationale.into(),
        }
    }

    /// Clear price fields and position size, keeping the rationale.
    /// Used whenever the final action lands on HOLD.
    pub fn flatten(&mut self) {
        self.action = Signal::Hold;
        self.entry_price = None;
        self.take_profit = None;
        self.stop_loss = None;
        self.position_size_pct = Decimal::ZERO;
    }
}

/// Risk rating for a ticker, used to cap position size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskRating {
    Low,
    Moderate,
    High,
}

impl RiskRating {
    /// Maximum position size (% of portfolio) permitted at this rating.
    pub fn max_position_pct(&self) -> Decimal {
        match self {
            RiskRating::High => Decimal::from(8),
            RiskRating::Moderate => Decimal::from(15),
            RiskRating::Low => Decimal::from(25),
        }
    }
}
