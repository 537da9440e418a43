use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use decision_core::{
    DirectionalBias, GovernorDecision, MarketRegime, ModelTier, MomentumState, Signal,
    TradeDirection, TradingSession,
};
use edge_estimator::EdgeAssessment;
use position_sizer::PositionSizingDecision;
use serde::{Deserialize, Serialize};

use crate::gates::GateTransition;

pub const DECISION_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionMode {
    LiveAi,
    ReplayConsensusOnly,
}

impl DecisionMode {
    pub fn from_replay(replay_mode: bool) -> Self {
        if replay_mode {
            DecisionMode::ReplayConsensusOnly
        } else {
            DecisionMode::LiveAi
        }
    }
}

/// Observability payload attached to every decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMetadata {
    pub agent_count: usize,
    pub signal_votes: BTreeMap<Signal, usize>,
    pub decision_mode: DecisionMode,
    pub governor_decision: GovernorDecision,
    pub size_multiplier: f64,
    pub consensus_signal: Signal,
    pub consensus_score: f64,
    pub consensus_confidence: f64,
    pub agent_weights: BTreeMap<String, f64>,
    pub regime: MarketRegime,
    pub trading_session: TradingSession,
    pub directional_bias: DirectionalBias,
    pub momentum_state: MomentumState,
    pub divergence_streak: u32,
    pub override_applied: bool,
    pub override_reason: Option<String>,
    pub gate_trail: Vec<GateTransition>,
    pub edge_verdict: Option<EdgeAssessment>,
    pub model_tier: Option<ModelTier>,
    pub decision_version: u32,
}

/// Terminal output of one decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalDecision {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub signal: Signal,
    pub confidence: f64,
    pub trade_direction: TradeDirection,
    /// AI-vs-consensus disagreement before any override or gate
    pub divergence_flag: bool,
    pub reasoning: String,
    pub position_sizing: Option<PositionSizingDecision>,
    pub entry_price: Option<f64>,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub estimated_hold_minutes: Option<u32>,
    pub latency_ms: u64,
    pub metadata: DecisionMetadata,
}

impl FinalDecision {
    pub fn is_actionable(&self) -> bool {
        self.signal.is_directional()
    }

    pub fn is_replay(&self) -> bool {
        self.metadata.decision_mode == DecisionMode::ReplayConsensusOnly
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}
