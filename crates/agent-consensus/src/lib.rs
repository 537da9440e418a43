//! Agent vote aggregation: adaptive per-agent weights, the weighted consensus
//! vote, and reconciliation of the AI signal against that consensus.

pub mod consensus;
pub mod divergence;
pub mod weights;

pub use consensus::{ConsensusEngine, ConsensusResult};
pub use divergence::{DivergenceGuard, GuardOutcome};
pub use weights::{AdaptiveWeightCalculator, AgentWeights};
