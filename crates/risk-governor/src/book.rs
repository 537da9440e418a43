use async_trait::async_trait;
use dashmap::DashMap;
use decision_core::{DecisionResult, GovernorDecision, GovernorSource};

use crate::governor::DailyRiskGovernor;
use crate::models::{GovernorCheck, GovernorLimits, GovernorState};

/// Per-symbol governor state. Each symbol lives in its own map shard entry, so
/// outcome updates for one symbol never block another.
pub struct GovernorBook {
    states: DashMap<String, GovernorState>,
    governor: DailyRiskGovernor,
}

impl Default for GovernorBook {
    fn default() -> Self {
        Self::new(GovernorLimits::default())
    }
}

impl GovernorBook {
    pub fn new(limits: GovernorLimits) -> Self {
        Self {
            states: DashMap::new(),
            governor: DailyRiskGovernor::new(limits),
        }
    }

    /// Apply one resolved trade outcome and return the updated state.
    pub fn record_outcome(&self, symbol: &str, pnl_percent: f64) -> GovernorState {
        let mut entry = self.states.entry(symbol.to_string()).or_default();
        if !pnl_percent.is_finite() {
            tracing::warn!("Ignoring non-finite P&L {} for {}", pnl_percent, symbol);
            return *entry;
        }

        let before = self.governor.evaluate(&entry);

        entry.daily_pnl_percent += pnl_percent;
        entry.daily_trade_count += 1;
        if pnl_percent < 0.0 {
            entry.consecutive_losses += 1;
        } else {
            entry.consecutive_losses = 0;
        }

        let state = *entry;
        drop(entry);

        let check = self.governor.check(&state);
        if check.decision != before {
            match check.decision {
                GovernorDecision::Halt => tracing::warn!("🛑 {} governor HALT: {}", symbol, check.reason),
                GovernorDecision::ReduceSize => {
                    tracing::warn!("⚠️ {} governor REDUCE_SIZE: {}", symbol, check.reason)
                }
                GovernorDecision::Allow => tracing::info!("{} governor back to ALLOW", symbol),
            }
        }

        state
    }

    pub fn state(&self, symbol: &str) -> Option<GovernorState> {
        self.states.get(symbol).map(|s| *s)
    }

    /// Unknown symbols have traded nothing today and evaluate to ALLOW.
    pub fn evaluate(&self, symbol: &str) -> GovernorDecision {
        self.check(symbol).decision
    }

    pub fn check(&self, symbol: &str) -> GovernorCheck {
        let state = self.state(symbol).unwrap_or_default();
        self.governor.check(&state)
    }

    /// Start a new trading day.
    pub fn reset_day(&self) {
        let symbols = self.states.len();
        self.states.clear();
        tracing::info!("Governor day reset ({} symbols cleared)", symbols);
    }
}

#[async_trait]
impl GovernorSource for GovernorBook {
    async fn governor_decision(&self, symbol: &str) -> DecisionResult<GovernorDecision> {
        Ok(self.evaluate(symbol))
    }
}
