use std::collections::HashMap;

use decision_core::{
    clamp_bounded, AgentCapability, AgentFeedback, AgentPerformance, AgentSignal, MarketRegime,
};
use serde::{Deserialize, Serialize};

/// Agent name to vote weight.
pub type AgentWeights = HashMap<String, f64>;

/// Adaptive per-agent weight calculator
///
/// Weight for one agent is built in three additive layers:
///   base   = max(accuracy * 0.5 - latency * 0.2, 0.1)   (1.0 without history)
///   boost  = win_rate * 0.4 + avg_confidence * 0.3 - normalized_latency * 0.2
///   regime = capability bonus for the current market regime
/// and the sum is clamped to [min_weight, max_weight].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveWeightCalculator {
    /// Weight given to an agent with no performance history
    pub fallback_weight: f64,

    /// Floor applied to the history-derived base before feedback
    pub min_base_weight: f64,

    pub min_weight: f64,
    pub max_weight: f64,

    /// Bonus for the trend-capable agent in TRENDING markets
    pub trending_trend_boost: f64,

    /// Bonus for the risk-capable agent in VOLATILE markets
    pub volatile_risk_boost: f64,

    /// Bonus for the portfolio-capable agent in RANGING markets
    pub ranging_portfolio_boost: f64,
}

impl Default for AdaptiveWeightCalculator {
    fn default() -> Self {
        Self {
            fallback_weight: 1.0,
            min_base_weight: 0.1,
            min_weight: 0.1,
            max_weight: 2.0,
            trending_trend_boost: 0.20,
            volatile_risk_boost: 0.20,
            ranging_portfolio_boost: 0.15,
        }
    }
}

impl AdaptiveWeightCalculator {
    /// Weight for every agent present in `signals`. Agents without history or
    /// feedback still receive an entry built from the fallback weight.
    pub fn compute(
        &self,
        signals: &[AgentSignal],
        performance: &HashMap<String, AgentPerformance>,
        feedback: &HashMap<String, AgentFeedback>,
        regime: MarketRegime,
    ) -> AgentWeights {
        let max_latency = feedback
            .values()
            .map(|f| f.avg_latency_ms)
            .filter(|l| l.is_finite())
            .fold(0.0_f64, f64::max)
            .max(1.0);

        let mut weights = AgentWeights::with_capacity(signals.len());
        for signal in signals {
            let mut weight = self.base_weight(performance.get(&signal.agent_name));

            if let Some(fb) = feedback.get(&signal.agent_name) {
                weight += feedback_boost(fb, max_latency);
            }

            weight += self.regime_boost(signal.capability(), regime);

            weights.insert(
                signal.agent_name.clone(),
                clamp_bounded(weight, self.min_weight, self.max_weight),
            );
        }
        weights
    }

    fn base_weight(&self, performance: Option<&AgentPerformance>) -> f64 {
        match performance {
            Some(p) => {
                let raw = p.historical_accuracy_score * 0.5 - p.latency_weight * 0.2;
                if raw.is_finite() {
                    raw.max(self.min_base_weight)
                } else {
                    self.fallback_weight
                }
            }
            None => self.fallback_weight,
        }
    }

    fn regime_boost(&self, capability: Option<AgentCapability>, regime: MarketRegime) -> f64 {
        match (regime, capability) {
            (MarketRegime::Trending, Some(AgentCapability::Trend)) => self.trending_trend_boost,
            (MarketRegime::Volatile, Some(AgentCapability::Risk)) => self.volatile_risk_boost,
            (MarketRegime::Ranging, Some(AgentCapability::Portfolio)) => {
                self.ranging_portfolio_boost
            }
            _ => 0.0,
        }
    }
}

fn feedback_boost(feedback: &AgentFeedback, max_latency: f64) -> f64 {
    let normalized_latency = feedback.avg_latency_ms / max_latency;
    let boost =
        feedback.win_rate * 0.4 + feedback.avg_confidence * 0.3 - normalized_latency * 0.2;
    if boost.is_finite() {
        boost
    } else {
        0.0
    }
}
