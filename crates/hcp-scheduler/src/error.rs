//! Scoring error types.

use std::time::Duration;

use hcp_resource::ResourceError;
use thiserror::Error;

/// Errors returned by the scoring engine.
///
/// Malformed taints and tolerations are recovered inside the priority
/// functions and never surface here; everything below is a caller or
/// configuration problem.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("unknown priority function: {0}")]
    UnknownPriority(String),

    #[error("invalid scoring input: {0}")]
    InvalidScoringInput(String),

    #[error("no feasible cluster: every candidate has zero nodes")]
    NoFeasibleCluster,

    #[error("invalid scheduler config: {0}")]
    Config(String),

    #[error("scoring abandoned after {0:?}")]
    Timeout(Duration),

    #[error("scoring task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

pub type ScoringResult<T> = Result<T, ScoringError>;
