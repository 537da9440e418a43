use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    AgentFeedback, AgentPerformance, AgentSignal, AiDecision, DecisionResult, DirectionalBias,
    GovernorDecision, MarketRegime, ModelTier, MomentumState, Signal, TradingSession,
};

/// Runs the analysis agents for one symbol and returns their signals.
#[async_trait]
pub trait AgentSource: Send + Sync {
    async fn collect_signals(&self, symbol: &str, prices: &[f64]) -> DecisionResult<Vec<AgentSignal>>;
}

/// Historical agent performance and outcome feedback, keyed by agent name.
#[async_trait]
pub trait PerformanceSource: Send + Sync {
    async fn agent_performance(&self) -> DecisionResult<HashMap<String, AgentPerformance>>;

    async fn agent_feedback(&self) -> DecisionResult<HashMap<String, AgentFeedback>>;
}

/// Context handed to the AI strategist.
#[derive(Debug, Clone)]
pub struct StrategyRequest {
    pub symbol: String,
    pub signals: Vec<AgentSignal>,
    pub consensus_signal: Signal,
    pub consensus_confidence: f64,
    pub regime: MarketRegime,
    pub session: TradingSession,
    pub bias: DirectionalBias,
    pub momentum: MomentumState,
    pub model_tier: ModelTier,
}

/// External strategist producing the primary signal.
#[async_trait]
pub trait AiStrategist: Send + Sync {
    async fn decide(&self, request: &StrategyRequest) -> DecisionResult<AiDecision>;
}

/// Current kill-switch decision for a symbol.
#[async_trait]
pub trait GovernorSource: Send + Sync {
    async fn governor_decision(&self, symbol: &str) -> DecisionResult<GovernorDecision>;
}
