//! Error types for the resource and topology model.

use thiserror::Error;

/// Result type alias for model operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors raised while reading descriptors or building topology snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("malformed taint {key:?}: {reason}")]
    MalformedTaint { key: String, reason: String },

    #[error("malformed toleration {key:?}: {reason}")]
    MalformedToleration { key: String, reason: String },

    #[error("invalid quantity: {0:?}")]
    InvalidQuantity(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("node {node} not found in cluster {cluster}")]
    UnknownNode { cluster: String, node: String },

    #[error("snapshot error: {0}")]
    Snapshot(String),
}
