use decision_core::{clamp_unit, Signal};
use serde::{Deserialize, Serialize};

/// Result of reconciling the AI signal with the consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardOutcome {
    pub signal: Signal,
    pub confidence: f64,
    pub override_applied: bool,
    pub override_reason: Option<String>,
}

impl GuardOutcome {
    fn pass_through(signal: Signal, confidence: f64) -> Self {
        Self {
            signal,
            confidence,
            override_applied: false,
            override_reason: None,
        }
    }
}

/// Reconciles the AI signal against the consensus when they disagree.
///
/// Rules, in priority order:
///   1. consensus confidence >= `override_confidence`: adopt the consensus.
///   2. divergence streak >= `dampen_streak`: keep the AI signal, scale its
///      confidence by `dampen_factor` with a floor of `dampen_floor`.
///   3. otherwise pass the AI signal through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceGuard {
    pub override_confidence: f64,
    pub dampen_streak: u32,
    pub dampen_factor: f64,
    pub dampen_floor: f64,
}

impl Default for DivergenceGuard {
    fn default() -> Self {
        Self {
            override_confidence: 0.65,
            dampen_streak: 2,
            dampen_factor: 0.80,
            dampen_floor: 0.50,
        }
    }
}

impl DivergenceGuard {
    pub fn evaluate(
        &self,
        ai_signal: Signal,
        ai_confidence: f64,
        consensus_signal: Signal,
        consensus_confidence: f64,
        divergence_flag: bool,
        recent_divergence_streak: u32,
    ) -> GuardOutcome {
        let ai_confidence = clamp_unit(ai_confidence);
        if !divergence_flag {
            return GuardOutcome::pass_through(ai_signal, ai_confidence);
        }

        let consensus_confidence = clamp_unit(consensus_confidence);
        if consensus_confidence >= self.override_confidence {
            return GuardOutcome {
                signal: consensus_signal,
                confidence: consensus_confidence,
                override_applied: true,
                override_reason: Some(format!(
                    "ConsensusOverride consensus={:.2}≥{:.2} AI={}→{}",
                    consensus_confidence, self.override_confidence, ai_signal, consensus_signal
                )),
            };
        }

        if recent_divergence_streak >= self.dampen_streak {
            let dampened = clamp_unit((ai_confidence * self.dampen_factor).max(self.dampen_floor));
            return GuardOutcome {
                signal: ai_signal,
                confidence: dampened,
                override_applied: true,
                override_reason: Some(format!(
                    "ConfidenceDampen streak={} confidence {:.2}→{:.2}",
                    recent_divergence_streak, ai_confidence, dampened
                )),
            };
        }

        GuardOutcome::pass_through(ai_signal, ai_confidence)
    }
}
