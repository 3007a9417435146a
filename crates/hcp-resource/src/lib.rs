//! hcp-resource: resource and topology model for the HCP scheduler.
//!
//! Holds the read-mostly snapshots the scoring engine consumes:
//!
//! - **`types`**: pod, node and cluster descriptors as handed over by the
//!   orchestration layer (taints, tolerations, selectors, quantity maps)
//! - **`quantity`** / **`resource`**: quantity parsing, the numeric
//!   [`Resource`] vector and its [`Resources`] display form
//! - **`affinity`**: compiled label selectors and affinity terms
//! - **`pod_info`**, **`node_info`**, **`cluster_info`**: the aggregates
//!
//! # Snapshot discipline
//!
//! Aggregates are never mutated in place once built. Binding a pod to a
//! node produces a new [`NodeInfo`] / [`ClusterInfo`] that shares every
//! untouched node and pod through `Arc`, so a snapshot handed to a scoring
//! call stays valid while the orchestration layer builds the next one.

pub mod affinity;
pub mod cluster_info;
pub mod error;
pub mod node_info;
pub mod pod_info;
pub mod quantity;
pub mod resource;
pub mod types;

pub use affinity::{AffinityTerm, Selector, SelectorOperator, WeightedAffinityTerm};
pub use cluster_info::{
    ClusterInfo, ClusterInfoList, ClusterSnapshot, NodeSnapshot, ResourceSummary, build_cluster_list,
};
pub use error::{ResourceError, ResourceResult};
pub use node_info::NodeInfo;
pub use pod_info::PodInfo;
pub use quantity::{format_bytes, format_cpu, parse_milli_quantity, parse_quantity};
pub use resource::{Resource, Resources};
pub use types::*;
