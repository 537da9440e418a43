//! Ordered gate chain. Every gate is a pure `(context, state) -> state` step
//! that may only demote BUY/SELL to WATCH or lower confidence; the one
//! exception is the authority chain, which can discard an override and restore
//! the AI's own signal.

use decision_core::{
    DirectionalBias, MarketRegime, MomentumState, Signal, TradingSession,
};
use serde::{Deserialize, Serialize};

pub const MIN_TRADE_CONFIDENCE: f64 = 0.65;
pub const PHASE1_MIN_CONFIDENCE: f64 = 0.70;
pub const DIVERGENCE_CONFIDENCE_PENALTY: f64 = 0.85;
pub const DIVERGENCE_STREAK_WATCH: u32 = 2;
pub const PHASE3_MAX_DIVERGENCE_STREAK: u32 = 1;

/// Read-only inputs shared by every gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateContext {
    pub ai_signal: Signal,
    pub ai_confidence: f64,
    pub regime: MarketRegime,
    pub session: TradingSession,
    pub bias: DirectionalBias,
    pub momentum: MomentumState,
    /// Raw AI-vs-consensus disagreement, computed before any override
    pub divergence_flag: bool,
    pub divergence_streak: u32,
}

/// One recorded change to the working signal or confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateTransition {
    pub gate: String,
    pub from_signal: Signal,
    pub to_signal: Signal,
    pub confidence_before: f64,
    pub confidence_after: f64,
    pub note: String,
}

/// Working state threaded through the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateState {
    pub signal: Signal,
    pub confidence: f64,
    /// Whether a divergence override is currently in effect
    pub override_kept: bool,
    pub override_reason: Option<String>,
    pub trail: Vec<GateTransition>,
}

impl GateState {
    pub fn new(
        signal: Signal,
        confidence: f64,
        override_kept: bool,
        override_reason: Option<String>,
    ) -> Self {
        Self {
            signal,
            confidence,
            override_kept,
            override_reason,
            trail: Vec::new(),
        }
    }

    pub fn is_directional(&self) -> bool {
        self.signal.is_directional()
    }

    fn transition(&mut self, gate: &str, signal: Signal, confidence: f64, note: String) {
        self.trail.push(GateTransition {
            gate: gate.to_string(),
            from_signal: self.signal,
            to_signal: signal,
            confidence_before: self.confidence,
            confidence_after: confidence,
            note,
        });
        self.signal = signal;
        self.confidence = confidence;
    }

    fn force_watch(&mut self, gate: &str, note: String) {
        let confidence = self.confidence;
        self.transition(gate, Signal::Watch, confidence, note);
    }
}

pub type GateFn = fn(&GateContext, GateState) -> GateState;

#[derive(Clone, Copy)]
pub struct NamedGate {
    pub name: &'static str,
    pub apply: GateFn,
}

/// Gates in evaluation order.
pub const GATE_CHAIN: [NamedGate; 8] = [
    NamedGate { name: "AuthorityChain", apply: authority_chain },
    NamedGate { name: "SessionGate", apply: session_gate },
    NamedGate { name: "Phase1Gate", apply: opening_phase1_gate },
    NamedGate { name: "Phase3Gate", apply: opening_phase3_gate },
    NamedGate { name: "BiasGate", apply: directional_bias_gate },
    NamedGate { name: "DivergencePenalty", apply: divergence_penalty },
    NamedGate { name: "MultiFilter", apply: multi_filter },
    NamedGate { name: "EligibilityGuard", apply: eligibility_gate },
];

/// Overrides may only move the AI downward (to WATCH/HOLD). An override that
/// resolved to BUY/SELL is discarded and the raw AI signal restored.
pub fn authority_chain(ctx: &GateContext, mut state: GateState) -> GateState {
    if state.override_kept && state.is_directional() {
        let note = format!(
            "Blocked upward override {}, keeping AI {}",
            state.signal, ctx.ai_signal
        );
        state.transition("AuthorityChain", ctx.ai_signal, ctx.ai_confidence, note);
        state.override_kept = false;
        state.override_reason = None;
    }
    state
}

pub fn session_gate(ctx: &GateContext, mut state: GateState) -> GateState {
    if state.is_directional() && ctx.session.is_dormant() {
        state.force_watch("SessionGate", format!("session={}", ctx.session));
    }
    state
}

/// Price discovery: strong bias, a higher confidence floor and no divergence.
pub fn opening_phase1_gate(ctx: &GateContext, mut state: GateState) -> GateState {
    if ctx.session != TradingSession::OpeningPhase1 {
        return state;
    }

    if state.is_directional() && !ctx.bias.is_strong() {
        state.force_watch("Phase1Gate", format!("STRONG bias required, bias={}", ctx.bias));
    }
    if state.is_directional() && state.confidence < PHASE1_MIN_CONFIDENCE {
        state.force_watch(
            "Phase1Gate",
            format!(
                "confidence={:.3} below {:.2}",
                state.confidence, PHASE1_MIN_CONFIDENCE
            ),
        );
    }
    if state.is_directional() && ctx.divergence_flag {
        state.force_watch("Phase1Gate", "divergence".to_string());
    }
    state
}

/// Continuation or trap: fading momentum or any divergence streak blocks entry.
pub fn opening_phase3_gate(ctx: &GateContext, mut state: GateState) -> GateState {
    if ctx.session != TradingSession::OpeningPhase3 {
        return state;
    }

    if state.is_directional() && ctx.momentum.is_fading() {
        state.force_watch("Phase3Gate", format!("momentum={}", ctx.momentum));
    }
    if state.is_directional() && ctx.divergence_streak >= PHASE3_MAX_DIVERGENCE_STREAK {
        state.force_watch(
            "Phase3Gate",
            format!("divergenceStreak={}", ctx.divergence_streak),
        );
    }
    state
}

pub fn directional_bias_gate(ctx: &GateContext, mut state: GateState) -> GateState {
    let against_bias = match state.signal {
        Signal::Buy => ctx.bias.is_short_bias(),
        Signal::Sell => ctx.bias.is_long_bias(),
        Signal::Hold | Signal::Watch => false,
    };
    if against_bias {
        state.force_watch(
            "BiasGate",
            format!("{} blocked in {} market", state.signal, ctx.bias),
        );
    }
    state
}

/// Confidence penalty on divergence, applied on top of any guard dampening.
/// A streak of two or more forces WATCH whatever the working signal.
pub fn divergence_penalty(ctx: &GateContext, mut state: GateState) -> GateState {
    if ctx.divergence_flag {
        let signal = state.signal;
        let penalized = state.confidence * DIVERGENCE_CONFIDENCE_PENALTY;
        state.transition(
            "DivergencePenalty",
            signal,
            penalized,
            format!("confidence x{:.2}", DIVERGENCE_CONFIDENCE_PENALTY),
        );
    }
    if ctx.divergence_streak >= DIVERGENCE_STREAK_WATCH && state.signal != Signal::Watch {
        state.force_watch(
            "DivergencePenalty",
            format!("streak={}", ctx.divergence_streak),
        );
    }
    state
}

pub fn multi_filter(ctx: &GateContext, mut state: GateState) -> GateState {
    if state.is_directional()
        && (state.confidence < MIN_TRADE_CONFIDENCE
            || ctx.divergence_flag
            || !ctx.session.is_active_scalping_window())
    {
        state.force_watch(
            "MultiFilter",
            format!(
                "confidence={:.3} divergence={} session={}",
                state.confidence, ctx.divergence_flag, ctx.session
            ),
        );
    }
    state
}

/// Hard AND of every entry condition for the surviving side.
pub fn eligibility_gate(ctx: &GateContext, mut state: GateState) -> GateState {
    let eligible = match state.signal {
        Signal::Buy => {
            ctx.session.is_active_scalping_window()
                && matches!(ctx.regime, MarketRegime::Volatile | MarketRegime::Trending)
                && ctx.bias.is_long_bias()
                && state.confidence >= MIN_TRADE_CONFIDENCE
                && !ctx.divergence_flag
        }
        Signal::Sell => {
            ctx.session.allows_sell_entry()
                && ctx.regime == MarketRegime::Volatile
                && ctx.bias.is_short_bias()
                && state.confidence >= MIN_TRADE_CONFIDENCE
                && !ctx.divergence_flag
        }
        Signal::Hold | Signal::Watch => true,
    };

    if !eligible {
        state.force_watch(
            "EligibilityGuard",
            format!(
                "{} blocked session={} regime={} bias={} confidence={:.3} divergence={}",
                state.signal,
                ctx.session,
                ctx.regime,
                ctx.bias,
                state.confidence,
                ctx.divergence_flag
            ),
        );
    }
    state
}
