use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use decision_core::{DecisionError, DecisionResult};
use edge_estimator::EdgeGatePolicy;
use risk_governor::GovernorLimits;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    // Collaborator deadlines
    pub agent_timeout_ms: u64,    // 5000
    pub weights_timeout_ms: u64,  // 2000
    pub governor_timeout_ms: u64, // 1000
    pub ai_timeout_ms: u64,       // 4000
    pub ai_peak_timeout_ms: u64,  // 1200

    // Rolling per-symbol decision window
    pub decision_memory_size: usize, // 3

    // Daily risk governor
    pub governor_r_unit_percent: f64, // 1.0

    // Bayesian edge gate
    pub edge_min_samples: u64,           // 20
    pub edge_win_rate_threshold: f64,    // 0.52
    pub edge_posterior_confidence: f64,  // 0.70
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: 5000,
            weights_timeout_ms: 2000,
            governor_timeout_ms: 1000,
            ai_timeout_ms: 4000,
            ai_peak_timeout_ms: 1200,
            decision_memory_size: 3,
            governor_r_unit_percent: 1.0,
            edge_min_samples: 20,
            edge_win_rate_threshold: 0.52,
            edge_posterior_confidence: 0.70,
        }
    }
}

impl OrchestratorConfig {
    /// Load `.env` (if any), then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            agent_timeout_ms: read(&lookup, "AGENT_TIMEOUT_MS", defaults.agent_timeout_ms)?,
            weights_timeout_ms: read(&lookup, "WEIGHTS_TIMEOUT_MS", defaults.weights_timeout_ms)?,
            governor_timeout_ms: read(&lookup, "GOVERNOR_TIMEOUT_MS", defaults.governor_timeout_ms)?,
            ai_timeout_ms: read(&lookup, "AI_TIMEOUT_MS", defaults.ai_timeout_ms)?,
            ai_peak_timeout_ms: read(&lookup, "AI_PEAK_TIMEOUT_MS", defaults.ai_peak_timeout_ms)?,
            decision_memory_size: read(
                &lookup,
                "DECISION_MEMORY_SIZE",
                defaults.decision_memory_size,
            )?,
            governor_r_unit_percent: read(
                &lookup,
                "GOVERNOR_R_UNIT_PERCENT",
                defaults.governor_r_unit_percent,
            )?,
            edge_min_samples: read(&lookup, "EDGE_MIN_SAMPLES", defaults.edge_min_samples)?,
            edge_win_rate_threshold: read(
                &lookup,
                "EDGE_WIN_RATE_THRESHOLD",
                defaults.edge_win_rate_threshold,
            )?,
            edge_posterior_confidence: read(
                &lookup,
                "EDGE_POSTERIOR_CONFIDENCE",
                defaults.edge_posterior_confidence,
            )?,
        };

        config
            .validate()
            .context("orchestrator configuration rejected")?;
        Ok(config)
    }

    pub fn validate(&self) -> DecisionResult<()> {
        let timeouts = [
            ("AGENT_TIMEOUT_MS", self.agent_timeout_ms),
            ("WEIGHTS_TIMEOUT_MS", self.weights_timeout_ms),
            ("GOVERNOR_TIMEOUT_MS", self.governor_timeout_ms),
            ("AI_TIMEOUT_MS", self.ai_timeout_ms),
            ("AI_PEAK_TIMEOUT_MS", self.ai_peak_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(DecisionError::InvalidConfig(format!("{name} must be positive")));
        }
        if self.ai_peak_timeout_ms > self.ai_timeout_ms {
            return Err(DecisionError::InvalidConfig(format!(
                "AI_PEAK_TIMEOUT_MS ({}) exceeds AI_TIMEOUT_MS ({})",
                self.ai_peak_timeout_ms, self.ai_timeout_ms
            )));
        }
        if self.decision_memory_size == 0 {
            return Err(DecisionError::InvalidConfig(
                "DECISION_MEMORY_SIZE must be at least 1".to_string(),
            ));
        }
        if !(self.governor_r_unit_percent.is_finite() && self.governor_r_unit_percent > 0.0) {
            return Err(DecisionError::InvalidConfig(format!(
                "GOVERNOR_R_UNIT_PERCENT must be positive, got {}",
                self.governor_r_unit_percent
            )));
        }
        for (name, value) in [
            ("EDGE_WIN_RATE_THRESHOLD", self.edge_win_rate_threshold),
            ("EDGE_POSTERIOR_CONFIDENCE", self.edge_posterior_confidence),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(DecisionError::InvalidConfig(format!(
                    "{name} must lie in (0, 1), got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn governor_limits(&self) -> Result<GovernorLimits> {
        GovernorLimits::with_r_unit(self.governor_r_unit_percent)
    }

    pub fn edge_policy(&self) -> EdgeGatePolicy {
        EdgeGatePolicy {
            min_samples: self.edge_min_samples,
            win_rate_threshold: self.edge_win_rate_threshold,
            posterior_confidence: self.edge_posterior_confidence,
        }
    }
}

fn read<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key}={raw:?} is not a valid value")),
        _ => Ok(default),
    }
}
