use anyhow::{bail, Result};
use decision_core::GovernorDecision;
use serde::{Deserialize, Serialize};

/// Intraday P&L and loss streak for one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorState {
    pub daily_pnl_percent: f64,
    pub consecutive_losses: u32,
    pub daily_trade_count: u32,
}

/// Kill-switch thresholds, expressed in R (one unit of planned risk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorLimits {
    /// Size of 1R as percent of capital
    pub r_unit_percent: f64,
    /// Halt once the day's loss reaches this many R
    pub halt_loss_r: f64,
    /// Halt (lock in the day) once profit reaches this many R
    pub lock_profit_r: f64,
    pub halt_consecutive_losses: u32,
    pub reduce_consecutive_losses: u32,
}

impl Default for GovernorLimits {
    fn default() -> Self {
        Self {
            r_unit_percent: 1.0,
            halt_loss_r: 1.5,
            lock_profit_r: 3.0,
            halt_consecutive_losses: 3,
            reduce_consecutive_losses: 2,
        }
    }
}

impl GovernorLimits {
    pub fn with_r_unit(r_unit_percent: f64) -> Result<Self> {
        let limits = Self {
            r_unit_percent,
            ..Self::default()
        };
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.r_unit_percent > 0.0 && self.r_unit_percent.is_finite()) {
            bail!("r_unit_percent must be a positive number");
        }
        if !(self.halt_loss_r > 0.0 && self.lock_profit_r > 0.0) {
            bail!("halt_loss_r and lock_profit_r must be positive");
        }
        if self.reduce_consecutive_losses >= self.halt_consecutive_losses {
            bail!("reduce_consecutive_losses must be below halt_consecutive_losses");
        }
        Ok(())
    }

    pub fn max_daily_loss_percent(&self) -> f64 {
        self.halt_loss_r * self.r_unit_percent
    }

    pub fn profit_lock_percent(&self) -> f64 {
        self.lock_profit_r * self.r_unit_percent
    }
}

/// Governor verdict with the breakers that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorCheck {
    pub decision: GovernorDecision,
    pub reason: String,
    pub daily_pnl_r: f64,
    pub consecutive_losses: u32,
    pub breakers_triggered: Vec<String>,
}
