use decision_core::{clamp_unit, AgentSignal, AiDecision, Signal};

/// Confidence used when there is nothing to vote on.
pub const NO_AGENTS_CONFIDENCE: f64 = 0.5;

// Tie-break order, most conservative first
const TIE_PRIORITY: [Signal; 4] = [Signal::Hold, Signal::Watch, Signal::Sell, Signal::Buy];

/// Rule-based stand-in for the AI strategist: majority vote over the agents,
/// mean agent confidence.
pub fn rule_based_decision(signals: &[AgentSignal]) -> AiDecision {
    if signals.is_empty() {
        return AiDecision::new(
            Signal::Hold,
            NO_AGENTS_CONFIDENCE,
            "RULE_BASED_FALLBACK: no agent signals",
        );
    }

    let votes = |signal: Signal| signals.iter().filter(|s| s.signal == signal).count();
    let mut winner = TIE_PRIORITY[0];
    for candidate in TIE_PRIORITY {
        if votes(candidate) > votes(winner) {
            winner = candidate;
        }
    }

    let mean_confidence =
        signals.iter().map(|s| clamp_unit(s.confidence)).sum::<f64>() / signals.len() as f64;

    AiDecision::new(
        winner,
        mean_confidence,
        format!(
            "RULE_BASED_FALLBACK: majority {} ({}/{} agents)",
            winner,
            votes(winner),
            signals.len()
        ),
    )
}
