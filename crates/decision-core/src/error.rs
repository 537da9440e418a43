use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("{call} timed out after {millis}ms")]
    Timeout { call: &'static str, millis: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DecisionResult<T> = Result<T, DecisionError>;
