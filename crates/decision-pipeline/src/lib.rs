//! The decision pipeline: consensus, divergence reconciliation, the ordered gate
//! chain and position sizing, assembled into one `FinalDecision` per cycle.

pub mod decision;
pub mod engine;
pub mod gates;

#[cfg(test)]
mod tests;

pub use decision::{DecisionMetadata, DecisionMode, FinalDecision, DECISION_VERSION};
pub use engine::{
    run_gate_chain, DecisionPipelineEngine, DecisionRequest, MarketContext, HALT_REASONING,
    REPLAY_REASONING,
};
pub use gates::{GateContext, GateState, GateTransition, NamedGate, GATE_CHAIN};
