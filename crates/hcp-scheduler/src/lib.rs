//! hcp-scheduler: the scoring core of the HCP multi-cluster scheduler.
//!
//! Given a pod and a list of candidate clusters, the engine runs the
//! enabled priority functions over every node, normalizes each function's
//! scores across the whole batch, averages node scores per cluster and
//! returns the clusters best first. It never filters nodes out; that is the
//! admission stage's job.
//!
//! # Components
//!
//! - **`priorities`**: the priority functions, their normalization and the
//!   name registry
//! - **`engine`**: ranking, selection and replica placement
//! - **`config`**: the TOML policy (`max_priority`, weights, replica strategy)

pub mod config;
pub mod engine;
pub mod error;
pub mod priorities;

pub use config::{MAX_PRIORITY_CEILING, MAX_WEIGHT, PriorityConfig, ReplicaStrategy, SchedulerConfig};
pub use engine::{ClusterScore, NodeScore, ReplicaPlacement, ScoringEngine};
pub use error::{ScoringError, ScoringResult};
pub use priorities::{Normalization, PriorityKind, PriorityRegistry, RegisteredPriority, normalize};
