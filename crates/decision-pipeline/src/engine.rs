use std::collections::BTreeMap;

use agent_consensus::{AgentWeights, ConsensusEngine, ConsensusResult, DivergenceGuard};
use chrono::{DateTime, Utc};
use decision_core::{
    clamp_unit, AgentSignal, AiDecision, DirectionalBias, GovernorDecision, MarketRegime,
    ModelTier, MomentumState, Signal, TradeDirection, TradingSession,
};
use edge_estimator::EdgeAssessment;
use position_sizer::{PositionSizingEngine, SizingInput};
use serde::{Deserialize, Serialize};

use crate::decision::{DecisionMetadata, DecisionMode, FinalDecision, DECISION_VERSION};
use crate::gates::{GateContext, GateState, GATE_CHAIN};

pub const HALT_REASONING: &str = "DailyRiskGovernor: session halted";
pub const REPLAY_REASONING: &str = "REPLAY_CONSENSUS_ONLY";
const CONSENSUS_ONLY_REASONING: &str = "CONSENSUS_ONLY: no AI decision available";

/// Classified market conditions for the cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    pub regime: MarketRegime,
    pub session: TradingSession,
    pub bias: DirectionalBias,
    pub momentum: MomentumState,
}

/// Everything the pipeline needs for one symbol and one cycle.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub symbol: String,
    pub trace_id: String,
    pub triggered_at: DateTime<Utc>,
    pub signals: Vec<AgentSignal>,
    /// Adaptive weights; empty means equal weighting
    pub weights: AgentWeights,
    /// Primary signal. Ignored in replay mode, where the consensus stands in.
    pub ai_decision: Option<AiDecision>,
    pub market: MarketContext,
    pub divergence_streak: u32,
    pub replay_mode: bool,
    pub governor_decision: GovernorDecision,
    /// Historical win rate of this setup, 0.0 when unknown
    pub edge_win_rate: f64,
    pub edge_assessment: Option<EdgeAssessment>,
    pub model_tier: Option<ModelTier>,
}

impl DecisionRequest {
    pub fn new(
        symbol: impl Into<String>,
        triggered_at: DateTime<Utc>,
        signals: Vec<AgentSignal>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            trace_id: String::new(),
            triggered_at,
            signals,
            weights: AgentWeights::new(),
            ai_decision: None,
            market: MarketContext::default(),
            divergence_streak: 0,
            replay_mode: false,
            governor_decision: GovernorDecision::Allow,
            edge_win_rate: 0.0,
            edge_assessment: None,
            model_tier: None,
        }
    }
}

/// Runs consensus, divergence reconciliation, the gate chain and sizing.
#[derive(Debug, Clone, Default)]
pub struct DecisionPipelineEngine {
    consensus: ConsensusEngine,
    guard: DivergenceGuard,
    sizing: PositionSizingEngine,
}

impl DecisionPipelineEngine {
    pub fn new(guard: DivergenceGuard, sizing: PositionSizingEngine) -> Self {
        Self {
            consensus: ConsensusEngine::new(),
            guard,
            sizing,
        }
    }

    pub fn consensus(&self, signals: &[AgentSignal], weights: &AgentWeights) -> ConsensusResult {
        if weights.is_empty() {
            self.consensus.compute(signals)
        } else {
            self.consensus.compute_weighted(signals, weights)
        }
    }

    pub fn build_decision(&self, request: &DecisionRequest) -> FinalDecision {
        let consensus = self.consensus(&request.signals, &request.weights);
        let ai = primary_decision(request, &consensus);

        if request.governor_decision == GovernorDecision::Halt {
            tracing::warn!(
                "[DailyRiskGovernor] HALT for {}, forcing HOLD trace_id={}",
                request.symbol,
                request.trace_id
            );
            return self.halted_decision(request, &consensus);
        }

        let divergence_flag = ai.signal != consensus.final_signal;
        let outcome = self.guard.evaluate(
            ai.signal,
            ai.confidence,
            consensus.final_signal,
            consensus.normalized_confidence,
            divergence_flag,
            request.divergence_streak,
        );
        if let Some(reason) = &outcome.override_reason {
            tracing::info!(
                "[DivergenceGuard] Override applied for {}: {} trace_id={}",
                request.symbol,
                reason,
                request.trace_id
            );
        }

        let ctx = GateContext {
            ai_signal: ai.signal,
            ai_confidence: clamp_unit(ai.confidence),
            regime: request.market.regime,
            session: request.market.session,
            bias: request.market.bias,
            momentum: request.market.momentum,
            divergence_flag,
            divergence_streak: request.divergence_streak,
        };
        let state = GateState::new(
            outcome.signal,
            outcome.confidence,
            outcome.override_applied,
            outcome.override_reason,
        );
        let state = run_gate_chain(&ctx, state, &request.trace_id);

        let signal = state.signal;
        let confidence = clamp_unit(state.confidence);
        let size_multiplier = request.governor_decision.size_multiplier();

        let position_sizing = signal.is_directional().then(|| {
            let sizing = self.sizing.compute(&SizingInput {
                confidence,
                regime: ctx.regime,
                divergence_flag,
                edge_win_rate: request.edge_win_rate,
                session: ctx.session,
                governor_multiplier: size_multiplier,
            });
            tracing::info!(
                "[PositionSizing] {} {} risk={:.3}% lot={:.2}x trace_id={}",
                request.symbol,
                signal,
                sizing.risk_percent,
                sizing.lot_multiplier,
                request.trace_id
            );
            sizing
        });

        let reasoning = match (state.override_kept, &state.override_reason) {
            (true, Some(reason)) => format!("{} [OVERRIDE: {}]", ai.reasoning, reason),
            _ => ai.reasoning.clone(),
        };

        let metadata = DecisionMetadata {
            override_applied: state.override_kept,
            override_reason: state.override_reason.clone(),
            gate_trail: state.trail,
            size_multiplier,
            ..base_metadata(request, &consensus)
        };

        FinalDecision {
            symbol: request.symbol.clone(),
            timestamp: request.triggered_at,
            trace_id: request.trace_id.clone(),
            signal,
            confidence,
            trade_direction: TradeDirection::from_signal(signal),
            divergence_flag,
            reasoning,
            position_sizing,
            entry_price: ai.entry_price,
            target_price: ai.target_price,
            stop_loss: ai.stop_loss,
            estimated_hold_minutes: ai.estimated_hold_minutes,
            latency_ms: 0,
            metadata,
        }
    }

    fn halted_decision(&self, request: &DecisionRequest, consensus: &ConsensusResult) -> FinalDecision {
        FinalDecision {
            symbol: request.symbol.clone(),
            timestamp: request.triggered_at,
            trace_id: request.trace_id.clone(),
            signal: Signal::Hold,
            confidence: 0.0,
            trade_direction: TradeDirection::Flat,
            divergence_flag: false,
            reasoning: HALT_REASONING.to_string(),
            position_sizing: None,
            entry_price: None,
            target_price: None,
            stop_loss: None,
            estimated_hold_minutes: None,
            latency_ms: 0,
            metadata: DecisionMetadata {
                size_multiplier: 0.0,
                ..base_metadata(request, consensus)
            },
        }
    }
}

/// Apply every gate in order, logging each transition.
pub fn run_gate_chain(ctx: &GateContext, mut state: GateState, trace_id: &str) -> GateState {
    for gate in GATE_CHAIN.iter() {
        let seen = state.trail.len();
        state = (gate.apply)(ctx, state);
        for step in &state.trail[seen..] {
            tracing::info!(
                "[{}] {}→{} confidence {:.3}→{:.3} ({}) trace_id={}",
                step.gate,
                step.from_signal,
                step.to_signal,
                step.confidence_before,
                step.confidence_after,
                step.note,
                trace_id
            );
        }
    }
    state
}

/// The AI decision, or the consensus standing in for it.
fn primary_decision(request: &DecisionRequest, consensus: &ConsensusResult) -> AiDecision {
    match (&request.ai_decision, request.replay_mode) {
        (Some(ai), false) => {
            let mut ai = ai.clone();
            ai.confidence = clamp_unit(ai.confidence);
            ai
        }
        (_, true) => AiDecision::new(
            consensus.final_signal,
            consensus.normalized_confidence,
            REPLAY_REASONING,
        ),
        (None, false) => AiDecision::new(
            consensus.final_signal,
            consensus.normalized_confidence,
            CONSENSUS_ONLY_REASONING,
        ),
    }
}

fn base_metadata(request: &DecisionRequest, consensus: &ConsensusResult) -> DecisionMetadata {
    let mut signal_votes = BTreeMap::new();
    for s in &request.signals {
        *signal_votes.entry(s.signal).or_insert(0) += 1;
    }

    DecisionMetadata {
        agent_count: request.signals.len(),
        signal_votes,
        decision_mode: DecisionMode::from_replay(request.replay_mode),
        governor_decision: request.governor_decision,
        size_multiplier: 1.0,
        consensus_signal: consensus.final_signal,
        consensus_score: consensus.raw_score,
        consensus_confidence: consensus.normalized_confidence,
        agent_weights: consensus
            .agent_weights
            .iter()
            .map(|(name, w)| (name.clone(), *w))
            .collect(),
        regime: request.market.regime,
        trading_session: request.market.session,
        directional_bias: request.market.bias,
        momentum_state: request.market.momentum,
        divergence_streak: request.divergence_streak,
        override_applied: false,
        override_reason: None,
        gate_trail: Vec::new(),
        edge_verdict: request.edge_assessment.clone(),
        model_tier: request.model_tier,
        decision_version: DECISION_VERSION,
    }
}
