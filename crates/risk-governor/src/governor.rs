use decision_core::GovernorDecision;

use crate::models::{GovernorCheck, GovernorLimits, GovernorState};

/// Pure mapping from intraday state to a kill-switch decision.
#[derive(Debug, Clone, Default)]
pub struct DailyRiskGovernor {
    limits: GovernorLimits,
}

impl DailyRiskGovernor {
    pub fn new(limits: GovernorLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &GovernorLimits {
        &self.limits
    }

    pub fn evaluate(&self, state: &GovernorState) -> GovernorDecision {
        self.check(state).decision
    }

    /// Evaluate every breaker and report which ones fired.
    pub fn check(&self, state: &GovernorState) -> GovernorCheck {
        let limits = &self.limits;
        let mut breakers_triggered = Vec::new();

        let daily_pnl_r = if state.daily_pnl_percent.is_finite() {
            state.daily_pnl_percent / limits.r_unit_percent
        } else {
            0.0
        };

        if daily_pnl_r <= -limits.halt_loss_r {
            breakers_triggered.push(format!(
                "daily_loss: {:.2}R reaches limit of {:.1}R",
                -daily_pnl_r, limits.halt_loss_r
            ));
        }

        if daily_pnl_r >= limits.lock_profit_r {
            breakers_triggered.push(format!(
                "profit_lock: {:.2}R reaches target of {:.1}R",
                daily_pnl_r, limits.lock_profit_r
            ));
        }

        if state.consecutive_losses >= limits.halt_consecutive_losses {
            breakers_triggered.push(format!(
                "consecutive_losses: {} >= limit of {}",
                state.consecutive_losses, limits.halt_consecutive_losses
            ));
        }

        let (decision, reason) = if !breakers_triggered.is_empty() {
            (
                GovernorDecision::Halt,
                format!("Session halted: {}", breakers_triggered.join("; ")),
            )
        } else if state.consecutive_losses >= limits.reduce_consecutive_losses {
            (
                GovernorDecision::ReduceSize,
                format!(
                    "Reduced size after {} consecutive losses",
                    state.consecutive_losses
                ),
            )
        } else {
            (GovernorDecision::Allow, "All governor limits clear".to_string())
        };

        GovernorCheck {
            decision,
            reason,
            daily_pnl_r,
            consecutive_losses: state.consecutive_losses,
            breakers_triggered,
        }
    }
}
