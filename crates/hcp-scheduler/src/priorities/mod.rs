//! Priority functions.
//!
//! Each function maps (pod, node, cluster) to a raw per-node score. Raw
//! scores are collected for every node in a scoring call and then brought
//! into `[0, max_priority]` by the function's [`Normalization`].

pub mod inter_pod_affinity;
pub mod node_affinity;
pub mod registry;
pub mod resource_allocation;
pub mod taint_toleration;

use std::fmt;

use hcp_resource::{ClusterInfo, NodeInfo, PodInfo};

use crate::error::ScoringResult;

pub use registry::{PriorityRegistry, RegisteredPriority};

/// The registered priority functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriorityKind {
    TaintToleration,
    NodeAffinity,
    InterPodAffinity,
    LeastRequested,
    MostRequested,
    BalancedResourceAllocation,
}

/// How a batch of raw scores is mapped onto `[0, max_priority]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Raw scores are already in range.
    None,
    /// `raw * max / batch_max`; all zero when the batch max is zero.
    ScaleByMax,
    /// Linear between batch min (0) and batch max (`max`); all zero when flat.
    MinMax,
    /// Linear between batch max (0) and batch min (`max`); all `max` when flat.
    ReverseMinMax,
}

impl PriorityKind {
    pub const ALL: [PriorityKind; 6] = [
        PriorityKind::TaintToleration,
        PriorityKind::NodeAffinity,
        PriorityKind::InterPodAffinity,
        PriorityKind::LeastRequested,
        PriorityKind::MostRequested,
        PriorityKind::BalancedResourceAllocation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TaintToleration => "TaintToleration",
            Self::NodeAffinity => "NodeAffinity",
            Self::InterPodAffinity => "InterPodAffinity",
            Self::LeastRequested => "LeastRequested",
            Self::MostRequested => "MostRequested",
            Self::BalancedResourceAllocation => "BalancedResourceAllocation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn normalization(self) -> Normalization {
        match self {
            Self::TaintToleration => Normalization::ReverseMinMax,
            Self::NodeAffinity => Normalization::ScaleByMax,
            Self::InterPodAffinity => Normalization::MinMax,
            Self::LeastRequested | Self::MostRequested | Self::BalancedResourceAllocation => {
                Normalization::None
            }
        }
    }

    /// Raw score of `node` for `pod`.
    ///
    /// The built-in functions recover from bad input locally and always
    /// return `Ok`. An `Err` marks the node degraded for this priority: the
    /// engine scores it 0 and leaves it out of the batch bounds (see
    /// [`normalize`]).
    pub fn score(
        self,
        pod: &PodInfo,
        node: &NodeInfo,
        cluster: &ClusterInfo,
        max_priority: i64,
    ) -> ScoringResult<i64> {
        let raw = match self {
            Self::TaintToleration => taint_toleration::score(pod, node),
            Self::NodeAffinity => node_affinity::score(pod, node),
            Self::InterPodAffinity => inter_pod_affinity::score(pod, node, cluster),
            Self::LeastRequested => resource_allocation::least_requested(pod, node, max_priority),
            Self::MostRequested => resource_allocation::most_requested(pod, node, max_priority),
            Self::BalancedResourceAllocation => {
                resource_allocation::balanced_allocation(pod, node, max_priority)
            }
        };
        Ok(raw)
    }
}

impl fmt::Display for PriorityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalize one batch of raw scores.
///
/// `None` marks a node whose raw score could not be computed; it gets 0 and
/// is left out of the batch min and max.
pub fn normalize(raw: &[Option<i64>], normalization: Normalization, max_priority: i64) -> Vec<i64> {
    let present = raw.iter().flatten().copied();
    let lo = present.clone().min().unwrap_or(0);
    let hi = present.max().unwrap_or(0);

    raw.iter()
        .map(|score| {
            let Some(v) = *score else {
                return 0;
            };
            match normalization {
                Normalization::None => v.clamp(0, max_priority),
                Normalization::ScaleByMax if hi <= 0 => 0,
                Normalization::ScaleByMax => scale(v.max(0), hi, max_priority),
                Normalization::MinMax if hi == lo => 0,
                Normalization::MinMax => scale(v - lo, hi - lo, max_priority),
                Normalization::ReverseMinMax if hi == lo => max_priority,
                Normalization::ReverseMinMax => scale(hi - v, hi - lo, max_priority),
            }
        })
        .collect()
}

/// `part * max / whole` without intermediate overflow.
fn scale(part: i64, whole: i64, max_priority: i64) -> i64 {
    let scaled = i128::from(part) * i128::from(max_priority) / i128::from(whole);
    i64::try_from(scaled).unwrap_or(max_priority)
}
