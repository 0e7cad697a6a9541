use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Profile build failed: {0}")]
    ProfileBuild(String),

    #[error("Content catalog error: {0}")]
    Catalog(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Candidate not found: {0}")]
    CandidateNotFound(Uuid),

    #[error("Malformed candidate: {0}")]
    InvalidCandidate(String),

    #[error("Invalid interaction: {0}")]
    InvalidInteraction(String),

    #[error("Profile cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure of a single signal for a single candidate. Never leaves the ranker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScorerError {
    #[error("candidate timestamp lies in the future")]
    FutureTimestamp,

    #[error("non-finite value for {0}")]
    NonFinite(&'static str),

    #[error("scoring strategy failed: {0}")]
    Strategy(String),
}

impl From<redis::RedisError> for EngineError {
    fn from(e: redis::RedisError) -> Self {
        EngineError::Cache(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Cache(format!("profile (de)serialization: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
