//! Node level aggregated information.

use std::sync::Arc;

use crate::error::ResourceResult;
use crate::pod_info::PodInfo;
use crate::resource::Resource;
use crate::types::{Labels, Node, Taint};

/// A node with the pods bound to it and its resource roll-up.
///
/// The affinity subsets are derived indices over `pods`, recomputed whenever
/// a new `NodeInfo` is built.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub cluster_name: String,
    pub node_name: String,
    pub node: Arc<Node>,

    pub pods: Vec<Arc<PodInfo>>,
    /// The subset of pods with any affinity or anti-affinity terms.
    pub pods_with_affinity: Vec<Arc<PodInfo>>,
    /// The subset of pods with required anti-affinity terms.
    pub pods_with_required_anti_affinity: Vec<Arc<PodInfo>>,

    /// Sum of the requests of all pods on this node.
    pub requested_resources: Resource,
    pub allocatable_resources: Resource,
    pub capacity_resources: Resource,
}

impl NodeInfo {
    pub fn new(cluster_name: &str, node: Arc<Node>, pods: Vec<Arc<PodInfo>>) -> ResourceResult<Self> {
        let allocatable_resources = Resource::from_quantities(&node.allocatable)?;
        let capacity_resources = Resource::from_quantities(&node.capacity)?;

        let mut info = Self {
            cluster_name: cluster_name.to_string(),
            node_name: node.name.clone(),
            node,
            pods: Vec::new(),
            pods_with_affinity: Vec::new(),
            pods_with_required_anti_affinity: Vec::new(),
            requested_resources: Resource::default(),
            allocatable_resources,
            capacity_resources,
        };
        for pod in pods {
            info.index(pod);
        }
        Ok(info)
    }

    /// A new snapshot of this node with `pod` bound to it. `self` is left
    /// untouched.
    pub fn with_pod(&self, pod: Arc<PodInfo>) -> Self {
        let mut next = self.clone();
        next.index(pod);
        next
    }

    fn index(&mut self, pod: Arc<PodInfo>) {
        self.requested_resources.add(&pod.requested_resources);
        if pod.has_affinity() {
            self.pods_with_affinity.push(Arc::clone(&pod));
        }
        if pod.has_required_anti_affinity() {
            self.pods_with_required_anti_affinity.push(Arc::clone(&pod));
        }
        self.pods.push(pod);
    }

    pub fn taints(&self) -> &[Taint] {
        &self.node.taints
    }

    pub fn labels(&self) -> &Labels {
        &self.node.labels
    }

    /// Whether the bound pods ask for more than the node can allocate.
    pub fn is_overcommitted(&self) -> bool {
        self.requested_resources.exceeds(&self.allocatable_resources)
    }
}
