use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agent_consensus::AdaptiveWeightCalculator;
use anyhow::Result;
use chrono::{DateTime, Utc};
use decision_core::{
    AgentCapability, AgentFeedback, AgentPerformance, AgentSignal, AgentSource, AiDecision,
    AiStrategist, DecisionError, DecisionResult, DirectionalBias, GovernorDecision,
    GovernorSource, MarketRegime, ModelTier, MomentumState, PerformanceSource, StrategyRequest,
    TradingSession,
};
use decision_pipeline::{DecisionPipelineEngine, DecisionRequest, FinalDecision, MarketContext};
use edge_estimator::{EdgeKey, EdgeRegistry, EdgeVerdict};
use risk_governor::{GovernorBook, GovernorState};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::fallback::rule_based_decision;
use crate::memory::{DecisionMemory, MemoryEntry};

/// Metadata keys the trend agent publishes its read of the tape under.
pub const BIAS_METADATA_KEY: &str = "directionalBias";
pub const MOMENTUM_METADATA_KEY: &str = "momentumState";

/// Last-decision confidence required before the peak fast path is taken.
const PEAK_MIN_LAST_CONFIDENCE: f64 = 0.65;

/// One symbol, one trigger.
#[derive(Debug, Clone)]
pub struct CycleRequest {
    pub symbol: String,
    pub triggered_at: DateTime<Utc>,
    /// Closing prices, oldest first
    pub prices: Vec<f64>,
    pub replay_mode: bool,
}

impl CycleRequest {
    pub fn live(symbol: impl Into<String>, triggered_at: DateTime<Utc>, prices: Vec<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            triggered_at,
            prices,
            replay_mode: false,
        }
    }

    pub fn replay(symbol: impl Into<String>, triggered_at: DateTime<Utc>, prices: Vec<f64>) -> Self {
        Self {
            replay_mode: true,
            ..Self::live(symbol, triggered_at, prices)
        }
    }
}

/// Drives one decision cycle per call: fan out to the collaborators under
/// deadlines, fall back on any failure, then hand everything to the pure
/// pipeline.
pub struct CycleOrchestrator {
    config: OrchestratorConfig,
    agents: Arc<dyn AgentSource>,
    performance: Arc<dyn PerformanceSource>,
    strategist: Arc<dyn AiStrategist>,
    governor: Arc<dyn GovernorSource>,
    governor_book: Arc<GovernorBook>,
    edges: Arc<EdgeRegistry>,
    memory: DecisionMemory,
    weights: AdaptiveWeightCalculator,
    engine: DecisionPipelineEngine,
}

impl CycleOrchestrator {
    /// The governor source defaults to the orchestrator's own book, so recorded
    /// outcomes feed straight back into the kill switch.
    pub fn new(
        config: OrchestratorConfig,
        agents: Arc<dyn AgentSource>,
        performance: Arc<dyn PerformanceSource>,
        strategist: Arc<dyn AiStrategist>,
    ) -> Result<Self> {
        config.validate()?;
        let governor_book = Arc::new(GovernorBook::new(config.governor_limits()?));
        let edges = Arc::new(EdgeRegistry::new(config.edge_policy()));

        Ok(Self {
            memory: DecisionMemory::new(config.decision_memory_size),
            governor: governor_book.clone(),
            governor_book,
            edges,
            agents,
            performance,
            strategist,
            weights: AdaptiveWeightCalculator::default(),
            engine: DecisionPipelineEngine::default(),
            config,
        })
    }

    pub fn with_governor_source(mut self, governor: Arc<dyn GovernorSource>) -> Self {
        self.governor = governor;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn governor_book(&self) -> &Arc<GovernorBook> {
        &self.governor_book
    }

    pub fn edge_registry(&self) -> &Arc<EdgeRegistry> {
        &self.edges
    }

    pub fn memory(&self) -> &DecisionMemory {
        &self.memory
    }

    pub async fn run_cycle(&self, request: CycleRequest) -> FinalDecision {
        let started = Instant::now();
        let trace_id = Uuid::new_v4().to_string();
        let symbol = request.symbol.as_str();

        let regime = MarketRegime::classify(&request.prices, None);
        let session = TradingSession::classify(request.triggered_at);
        tracing::info!(
            "Starting decision cycle for {} (session={}, regime={}, replay={}) trace_id={}",
            symbol,
            session,
            regime,
            request.replay_mode,
            trace_id
        );

        let signals = self.fetch_signals(symbol, &request.prices, &trace_id).await;
        let (performance, feedback) = self.fetch_history(&trace_id).await;
        let weights = self.weights.compute(&signals, &performance, &feedback, regime);
        let (bias, momentum) = trend_context(&signals);

        let mut pipeline_request = DecisionRequest::new(symbol, request.triggered_at, signals);
        pipeline_request.trace_id = trace_id.clone();
        pipeline_request.weights = weights;
        pipeline_request.replay_mode = request.replay_mode;
        pipeline_request.market = MarketContext {
            regime,
            session,
            bias,
            momentum,
        };

        let consensus = self
            .engine
            .consensus(&pipeline_request.signals, &pipeline_request.weights);
        let primary_signal = if request.replay_mode {
            consensus.final_signal
        } else {
            let streak = self.memory.divergence_streak(symbol);
            let peak_mode = is_peak_mode(session, regime, streak, self.memory.last_confidence(symbol));
            let model_tier = ModelTier::select(peak_mode, regime);
            let strategy = StrategyRequest {
                symbol: symbol.to_string(),
                signals: pipeline_request.signals.clone(),
                consensus_signal: consensus.final_signal,
                consensus_confidence: consensus.normalized_confidence,
                regime,
                session,
                bias,
                momentum,
                model_tier,
            };

            let (ai, governor) = tokio::join!(
                self.fetch_ai_decision(&strategy, peak_mode, &trace_id),
                self.fetch_governor(symbol, &trace_id),
            );

            let primary = ai.signal;
            pipeline_request.ai_decision = Some(ai);
            pipeline_request.governor_decision = governor;
            pipeline_request.divergence_streak = streak;
            pipeline_request.model_tier = Some(model_tier);
            primary
        };

        if primary_signal.is_directional() {
            let key = EdgeKey::new(session, regime, bias, primary_signal);
            let assessment = self.edges.evaluate(&key);
            if assessment.verdict == EdgeVerdict::Watch {
                tracing::info!(
                    "[EdgeGate] {} setup {} unproven: {} trace_id={}",
                    symbol,
                    key,
                    assessment.reason,
                    trace_id
                );
            }
            pipeline_request.edge_win_rate =
                self.edges.win_rate(&key, self.edges.policy().min_samples);
            pipeline_request.edge_assessment = Some(assessment);
        }

        let decision = self.engine.build_decision(&pipeline_request);
        if !request.replay_mode {
            self.memory.push(symbol, MemoryEntry::from(&decision));
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Decision for {}: {} conf={:.2} direction={} latency={}ms trace_id={}",
            symbol,
            decision.signal,
            decision.confidence,
            decision.trade_direction,
            latency_ms,
            trace_id
        );
        decision.with_latency(latency_ms)
    }

    /// Feed a resolved trade back into the governor and, for live BUY/SELL
    /// decisions, the edge registry.
    pub fn record_outcome(&self, decision: &FinalDecision, pnl_percent: f64) -> GovernorState {
        let state = self.governor_book.record_outcome(&decision.symbol, pnl_percent);

        if !decision.is_replay() && decision.is_actionable() && pnl_percent.is_finite() {
            let meta = &decision.metadata;
            let key = EdgeKey::new(
                meta.trading_session,
                meta.regime,
                meta.directional_bias,
                decision.signal,
            );
            self.edges.record(key, pnl_percent > 0.0);
        }
        state
    }

    async fn fetch_signals(&self, symbol: &str, prices: &[f64], trace_id: &str) -> Vec<AgentSignal> {
        let call = self.agents.collect_signals(symbol, prices);
        match with_deadline("agents", self.config.agent_timeout_ms, call).await {
            Ok(signals) => signals,
            Err(e) => {
                tracing::warn!(
                    "Agent fan-out failed for {}: {}, continuing with no signals trace_id={}",
                    symbol,
                    e,
                    trace_id
                );
                Vec::new()
            }
        }
    }

    async fn fetch_history(
        &self,
        trace_id: &str,
    ) -> (HashMap<String, AgentPerformance>, HashMap<String, AgentFeedback>) {
        let millis = self.config.weights_timeout_ms;
        let (performance, feedback) = tokio::join!(
            with_deadline("agent_performance", millis, self.performance.agent_performance()),
            with_deadline("agent_feedback", millis, self.performance.agent_feedback()),
        );

        let performance = performance.unwrap_or_else(|e| {
            tracing::warn!("Agent performance unavailable: {}, using equal base weights trace_id={}", e, trace_id);
            HashMap::new()
        });
        let feedback = feedback.unwrap_or_else(|e| {
            tracing::warn!("Agent feedback unavailable: {}, skipping feedback boost trace_id={}", e, trace_id);
            HashMap::new()
        });
        (performance, feedback)
    }

    async fn fetch_ai_decision(
        &self,
        strategy: &StrategyRequest,
        peak_mode: bool,
        trace_id: &str,
    ) -> AiDecision {
        let millis = if peak_mode {
            self.config.ai_peak_timeout_ms
        } else {
            self.config.ai_timeout_ms
        };

        match with_deadline("ai_strategist", millis, self.strategist.decide(strategy)).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    "⚠️ AI strategist failed for {} ({}, tier={}): falling back to rule-based vote trace_id={}",
                    strategy.symbol,
                    e,
                    strategy.model_tier,
                    trace_id
                );
                rule_based_decision(&strategy.signals)
            }
        }
    }

    async fn fetch_governor(&self, symbol: &str, trace_id: &str) -> GovernorDecision {
        let call = self.governor.governor_decision(symbol);
        match with_deadline("governor", self.config.governor_timeout_ms, call).await {
            Ok(decision) => {
                if decision != GovernorDecision::Allow {
                    tracing::warn!(
                        "[DailyRiskGovernor] {} for {} trace_id={}",
                        decision,
                        symbol,
                        trace_id
                    );
                }
                decision
            }
            Err(e) => {
                tracing::warn!(
                    "Governor state unavailable for {}: {}, defaulting to ALLOW trace_id={}",
                    symbol,
                    e,
                    trace_id
                );
                GovernorDecision::Allow
            }
        }
    }
}

async fn with_deadline<T, F>(call: &'static str, millis: u64, future: F) -> DecisionResult<T>
where
    F: Future<Output = DecisionResult<T>>,
{
    match tokio::time::timeout(Duration::from_millis(millis), future).await {
        Ok(result) => result,
        Err(_) => Err(DecisionError::Timeout { call, millis }),
    }
}

/// Fast path: the opening volatility window with a clean, confident history.
pub fn is_peak_mode(
    session: TradingSession,
    regime: MarketRegime,
    divergence_streak: u32,
    last_confidence: f64,
) -> bool {
    matches!(
        session,
        TradingSession::OpeningPhase1 | TradingSession::OpeningPhase2
    ) && regime == MarketRegime::Volatile
        && divergence_streak == 0
        && last_confidence >= PEAK_MIN_LAST_CONFIDENCE
}

/// Bias and momentum as published by the trend agent. A numeric bias is read
/// as a -5..+5 vote score.
pub fn trend_context(signals: &[AgentSignal]) -> (DirectionalBias, MomentumState) {
    let Some(trend) = signals
        .iter()
        .find(|s| s.capability() == Some(AgentCapability::Trend))
    else {
        return (DirectionalBias::Neutral, MomentumState::Unknown);
    };

    let bias = match trend.metadata.get(BIAS_METADATA_KEY) {
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .filter(|score| score.is_finite())
            .map(|score| DirectionalBias::from_vote_score(score.round().clamp(-5.0, 5.0) as i32))
            .unwrap_or_default(),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or_default(),
        _ => DirectionalBias::default(),
    };
    let momentum = trend
        .metadata_str(MOMENTUM_METADATA_KEY)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();

    (bias, momentum)
}
