use std::fmt;

use dashmap::DashMap;
use decision_core::{DirectionalBias, MarketRegime, Signal, TradingSession};
use serde::{Deserialize, Serialize};

use crate::{EdgeAssessment, EdgeGatePolicy};

/// Setup identity used to bucket trade outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeKey {
    pub session: TradingSession,
    pub regime: MarketRegime,
    pub bias: DirectionalBias,
    pub signal: Signal,
}

impl EdgeKey {
    pub fn new(
        session: TradingSession,
        regime: MarketRegime,
        bias: DirectionalBias,
        signal: Signal,
    ) -> Self {
        Self {
            session,
            regime,
            bias,
            signal,
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}|{}", self.session, self.regime, self.bias, self.signal)
    }
}

/// Win/loss counters for one setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeCondition {
    pub win_count: u64,
    pub loss_count: u64,
    pub total_count: u64,
}

impl EdgeCondition {
    pub fn win_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.win_count as f64 / self.total_count as f64
        }
    }
}

/// Append-only outcome counters per setup, sharded so concurrent symbols
/// never contend on a single lock.
pub struct EdgeRegistry {
    conditions: DashMap<EdgeKey, EdgeCondition>,
    policy: EdgeGatePolicy,
}

impl Default for EdgeRegistry {
    fn default() -> Self {
        Self::new(EdgeGatePolicy::default())
    }
}

impl EdgeRegistry {
    pub fn new(policy: EdgeGatePolicy) -> Self {
        Self {
            conditions: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &EdgeGatePolicy {
        &self.policy
    }

    /// Record one resolved outcome. Only BUY/SELL setups are tracked; returns
    /// whether the outcome was counted.
    pub fn record(&self, key: EdgeKey, profitable: bool) -> bool {
        if !key.signal.is_directional() {
            tracing::debug!("Ignoring edge outcome for non-directional setup {}", key);
            return false;
        }

        let mut entry = self.conditions.entry(key).or_default();
        if profitable {
            entry.win_count += 1;
        } else {
            entry.loss_count += 1;
        }
        entry.total_count += 1;

        tracing::debug!(
            "Edge {} now {}W/{}L ({:.1}%)",
            key,
            entry.win_count,
            entry.loss_count,
            entry.win_rate() * 100.0
        );
        true
    }

    pub fn condition(&self, key: &EdgeKey) -> Option<EdgeCondition> {
        self.conditions.get(key).map(|c| *c)
    }

    /// Observed win rate, or 0.0 (unknown) below `min_samples`.
    pub fn win_rate(&self, key: &EdgeKey, min_samples: u64) -> f64 {
        match self.condition(key) {
            Some(c) if c.total_count >= min_samples && c.total_count > 0 => c.win_rate(),
            _ => 0.0,
        }
    }

    /// Apply the edge gate policy to the setup's counters.
    pub fn evaluate(&self, key: &EdgeKey) -> EdgeAssessment {
        let condition = self.condition(key).unwrap_or_default();
        self.policy.evaluate(condition.win_count, condition.loss_count)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
