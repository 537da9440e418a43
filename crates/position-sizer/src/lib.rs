use anyhow::{bail, Result};
use decision_core::{clamp_bounded, MarketRegime, TradingSession};
use serde::{Deserialize, Serialize};

/// Risk-per-trade and lot sizing for a surviving BUY/SELL decision
///
/// The base risk unit is scaled by independent context factors:
///   risk = base * confidence * regime * divergence * edge * session * governor
/// then clamped to [min_risk_percent, max_risk_percent]. The lot multiplier is
/// risk relative to the base unit, clamped to [min_lot_multiplier, max_lot_multiplier].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizingEngine {
    /// Risk per trade before any factor, as percent of capital (1.0 = 1%)
    pub base_risk_percent: f64,

    pub min_risk_percent: f64,
    pub max_risk_percent: f64,

    pub min_lot_multiplier: f64,
    pub max_lot_multiplier: f64,

    /// Confidence is clamped into [confidence_floor, confidence_cap] before use
    pub confidence_floor: f64,
    pub confidence_cap: f64,

    /// Factor applied when the AI disagreed with the agent consensus
    pub divergence_factor: f64,
}

/// Context for one sizing computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingInput {
    pub confidence: f64,
    pub regime: MarketRegime,
    pub divergence_flag: bool,
    /// Historical win rate of the setup; 0.0 when unknown
    pub edge_win_rate: f64,
    pub session: TradingSession,
    /// Governor size multiplier; anything outside (0, 1] is treated as 1.0
    pub governor_multiplier: f64,
}

/// Sizing recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSizingDecision {
    /// Percent of capital at risk (0.1 to 1.5)
    pub risk_percent: f64,

    /// Lot size relative to a standard lot (0.25 to 2.0)
    pub lot_multiplier: f64,

    pub reasoning: String,
}

impl Default for PositionSizingEngine {
    fn default() -> Self {
        Self {
            base_risk_percent: 1.0,
            min_risk_percent: 0.1,
            max_risk_percent: 1.5,
            min_lot_multiplier: 0.25,
            max_lot_multiplier: 2.0,
            confidence_floor: 0.65,
            confidence_cap: 0.90,
            divergence_factor: 0.6,
        }
    }
}

impl PositionSizingEngine {
    pub fn new(
        base_risk_percent: f64,
        min_risk_percent: f64,
        max_risk_percent: f64,
        min_lot_multiplier: f64,
        max_lot_multiplier: f64,
    ) -> Result<Self> {
        if !(base_risk_percent > 0.0 && base_risk_percent <= 5.0) {
            bail!("base_risk_percent must be between 0 and 5");
        }
        if !(min_risk_percent > 0.0 && min_risk_percent <= max_risk_percent) {
            bail!("min_risk_percent must be > 0 and <= max_risk_percent");
        }
        if !(min_lot_multiplier > 0.0 && min_lot_multiplier <= max_lot_multiplier) {
            bail!("min_lot_multiplier must be > 0 and <= max_lot_multiplier");
        }

        Ok(Self {
            base_risk_percent,
            min_risk_percent,
            max_risk_percent,
            min_lot_multiplier,
            max_lot_multiplier,
            ..Self::default()
        })
    }

    pub fn compute(&self, input: &SizingInput) -> PositionSizingDecision {
        let confidence_factor =
            clamp_bounded(input.confidence, self.confidence_floor, self.confidence_cap);
        let divergence_factor = if input.divergence_flag {
            self.divergence_factor
        } else {
            1.0
        };
        let governor = governor_multiplier(input.governor_multiplier);

        let raw_risk = self.base_risk_percent
            * confidence_factor
            * regime_factor(input.regime)
            * divergence_factor
            * edge_factor(input.edge_win_rate)
            * session_factor(input.session)
            * governor;

        let risk_percent = clamp_bounded(raw_risk, self.min_risk_percent, self.max_risk_percent);
        let lot_multiplier = clamp_bounded(
            risk_percent / self.base_risk_percent,
            self.min_lot_multiplier,
            self.max_lot_multiplier,
        );

        let reasoning = format!(
            "conf={:.2} regime={} div={} edge={:.2} session={} gov={:.1} → risk={:.3}% lot={:.2}x",
            confidence_factor,
            input.regime,
            input.divergence_flag,
            input.edge_win_rate,
            input.session,
            governor,
            risk_percent,
            lot_multiplier
        );

        PositionSizingDecision {
            risk_percent,
            lot_multiplier,
            reasoning,
        }
    }
}

pub fn regime_factor(regime: MarketRegime) -> f64 {
    match regime {
        MarketRegime::Volatile => 1.0,
        MarketRegime::Trending => 0.9,
        MarketRegime::Ranging => 0.6,
        MarketRegime::Calm => 0.3,
        MarketRegime::Unknown => 0.5,
    }
}

/// Rewards setups with a proven edge and shrinks ones that lose; 0.0 means unknown.
pub fn edge_factor(edge_win_rate: f64) -> f64 {
    if !edge_win_rate.is_finite() || edge_win_rate <= 0.0 {
        1.0
    } else if edge_win_rate > 0.60 {
        1.2
    } else if edge_win_rate < 0.52 {
        0.5
    } else {
        1.0
    }
}

pub fn session_factor(session: TradingSession) -> f64 {
    match session {
        TradingSession::OpeningPhase1 => 0.5,
        TradingSession::OpeningPhase2 => 1.0,
        TradingSession::OpeningPhase3 => 0.7,
        TradingSession::PowerHour => 0.8,
        TradingSession::OpeningBurst => 0.8,
        TradingSession::MiddayConsolidation | TradingSession::OffHours => 0.5,
    }
}

fn governor_multiplier(value: f64) -> f64 {
    if value > 0.0 && value <= 1.0 {
        value
    } else {
        1.0
    }
}
