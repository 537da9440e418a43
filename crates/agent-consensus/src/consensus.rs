use std::collections::HashMap;

use decision_core::{clamp_unit, AgentSignal, Signal};
use serde::{Deserialize, Serialize};

use crate::AgentWeights;

const BUY_THRESHOLD: f64 = 0.3;
const SELL_THRESHOLD: f64 = -0.3;

/// Outcome of the weighted vote for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    pub final_signal: Signal,
    /// (raw_score + 1) / 2, in [0, 1]
    pub normalized_confidence: f64,
    /// Weighted mean vote score, in [-1, 1]
    pub raw_score: f64,
    /// Weights actually applied, keyed by agent name
    pub agent_weights: AgentWeights,
}

impl ConsensusResult {
    /// Result returned when there is nothing to vote on.
    pub fn fallback() -> Self {
        Self {
            final_signal: Signal::Hold,
            normalized_confidence: 0.0,
            raw_score: 0.0,
            agent_weights: HashMap::new(),
        }
    }
}

/// Weighted-vote consensus over agent signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusEngine;

impl ConsensusEngine {
    pub fn new() -> Self {
        Self
    }

    /// Equal-weight vote, used when adaptive weights are unavailable.
    pub fn compute(&self, signals: &[AgentSignal]) -> ConsensusResult {
        self.compute_weighted(signals, &HashMap::new())
    }

    /// Weighted vote. Agents missing from `weights` (or carrying a negative or
    /// non-finite weight) vote with weight 1.0.
    pub fn compute_weighted(&self, signals: &[AgentSignal], weights: &AgentWeights) -> ConsensusResult {
        if signals.is_empty() {
            return ConsensusResult::fallback();
        }

        let mut applied = AgentWeights::with_capacity(signals.len());
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for signal in signals {
            let weight = weights
                .get(&signal.agent_name)
                .copied()
                .filter(|w| w.is_finite() && *w >= 0.0)
                .unwrap_or(1.0);

            weighted_sum += signal.signal.score() * weight;
            total_weight += weight;
            applied.insert(signal.agent_name.clone(), weight);
        }

        let raw_score = if total_weight > 0.0 {
            (weighted_sum / total_weight).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        ConsensusResult {
            final_signal: signal_from_score(raw_score),
            normalized_confidence: clamp_unit((raw_score + 1.0) / 2.0),
            raw_score,
            agent_weights: applied,
        }
    }
}

fn signal_from_score(raw_score: f64) -> Signal {
    if raw_score > BUY_THRESHOLD {
        Signal::Buy
    } else if raw_score < SELL_THRESHOLD {
        Signal::Sell
    } else if raw_score > 0.0 {
        Signal::Watch
    } else {
        Signal::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn signals(votes: &[(&str, Signal)]) -> Vec<AgentSignal> {
        votes
            .iter()
            .map(|(name, s)| AgentSignal::new(*name, *s, 0.7))
            .collect()
    }

    #[test]
    fn test_empty_input_returns_fixed_fallback() {
        let result = ConsensusEngine::new().compute(&[]);
        assert_eq!(result.final_signal, Signal::Hold);
        assert_eq!(result.normalized_confidence, 0.0);
        assert!(result.agent_weights.is_empty());
        assert_eq!(result, ConsensusResult::fallback());
    }

    #[test]
    fn test_two_buys_one_sell_equal_weight() {
        let votes = signals(&[("A", Signal::Buy), ("B", Signal::Buy), ("C", Signal::Sell)]);
        let result = ConsensusEngine::new().compute(&votes);

        assert_eq!(result.final_signal, Signal::Buy);
        assert_relative_eq!(result.raw_score, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(result.normalized_confidence, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(result.agent_weights.len(), 3);
    }

    #[test]
    fn test_weights_shift_the_vote() {
        let votes = signals(&[("A", Signal::Buy), ("B", Signal::Sell)]);
        let weights: AgentWeights = [("A".to_string(), 0.5), ("B".to_string(), 2.0)]
            .into_iter()
            .collect();
        let result = ConsensusEngine::new().compute_weighted(&votes, &weights);

        // (0.5 - 2.0) / 2.5 = -0.6
        assert_eq!(result.final_signal, Signal::Sell);
        assert_relative_eq!(result.raw_score, -0.6, epsilon = 1e-12);
        assert_relative_eq!(result.normalized_confidence, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_weight_defaults_to_one() {
        let votes = signals(&[("A", Signal::Buy), ("B", Signal::Hold)]);
        let weights: AgentWeights = [("A".to_string(), 1.0)].into_iter().collect();
        let result = ConsensusEngine::new().compute_weighted(&votes, &weights);

        assert_relative_eq!(result.agent_weights["B"], 1.0);
        assert_relative_eq!(result.raw_score, 0.5);
        assert_eq!(result.final_signal, Signal::Buy);
    }

    #[test]
    fn test_signal_thresholds() {
        assert_eq!(signal_from_score(0.31), Signal::Buy);
        assert_eq!(signal_from_score(0.3), Signal::Watch);
        assert_eq!(signal_from_score(0.01), Signal::Watch);
        assert_eq!(signal_from_score(0.0), Signal::Hold);
        assert_eq!(signal_from_score(-0.3), Signal::Hold);
        assert_eq!(signal_from_score(-0.31), Signal::Sell);
    }

    #[test]
    fn test_all_watch_resolves_to_buy() {
        // WATCH scores +0.5, above the BUY threshold
        let votes = signals(&[("A", Signal::Watch), ("B", Signal::Watch)]);
        let result = ConsensusEngine::new().compute(&votes);
        assert_eq!(result.final_signal, Signal::Buy);
        assert_relative_eq!(result.normalized_confidence, 0.75);
    }

    #[test]
    fn test_zero_total_weight_scores_zero() {
        let votes = signals(&[("A", Signal::Buy)]);
        let weights: AgentWeights = [("A".to_string(), 0.0)].into_iter().collect();
        let result = ConsensusEngine::new().compute_weighted(&votes, &weights);

        assert_eq!(result.final_signal, Signal::Hold);
        assert_relative_eq!(result.normalized_confidence, 0.5);
    }

    #[test]
    fn test_confidence_bounded_for_every_vote_mix() {
        let engine = ConsensusEngine::new();
        for a in Signal::ALL {
            for b in Signal::ALL {
                for c in Signal::ALL {
                    let votes = signals(&[("A", *a), ("B", *b), ("C", *c)]);
                    let result = engine.compute(&votes);
                    assert!((0.0..=1.0).contains(&result.normalized_confidence));
                    assert!((-1.0..=1.0).contains(&result.raw_score));
                }
            }
        }
    }
}
