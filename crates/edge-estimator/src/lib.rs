pub mod bayesian;
pub mod registry;

pub use bayesian::{BayesianEdgeEstimator, EdgeAssessment, EdgeGatePolicy, EdgeVerdict};
pub use registry::{EdgeCondition, EdgeKey, EdgeRegistry};
