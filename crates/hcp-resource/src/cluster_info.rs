//! Cluster aggregate and the snapshot loader.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResourceError, ResourceResult};
use crate::node_info::NodeInfo;
use crate::pod_info::PodInfo;
use crate::resource::{Resource, Resources};
use crate::types::{ClusterDescriptor, Node, Pod};

/// The ordered candidate clusters handed to one scoring call.
pub type ClusterInfoList = Vec<ClusterInfo>;

/// A cluster's nodes and the three-tier resource roll-up across them.
#[derive(Debug, Clone)]
pub struct ClusterInfo {
    pub cluster_name: String,
    pub nodes: Vec<Arc<NodeInfo>>,
    pub requested_resources: Resource,
    pub allocable_resources: Resource,
    pub capacity_resources: Resource,
    pub descriptor: Arc<ClusterDescriptor>,
}

/// Display form of a cluster's roll-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSummary {
    pub requested: Resources,
    pub allocable: Resources,
    pub capacity: Resources,
}

impl ClusterInfo {
    pub fn new(descriptor: Arc<ClusterDescriptor>, nodes: Vec<Arc<NodeInfo>>) -> Self {
        let mut requested_resources = Resource::default();
        let mut allocable_resources = Resource::default();
        let mut capacity_resources = Resource::default();
        for node in &nodes {
            requested_resources.add(&node.requested_resources);
            allocable_resources.add(&node.allocatable_resources);
            capacity_resources.add(&node.capacity_resources);
        }
        Self {
            cluster_name: descriptor.name.clone(),
            nodes,
            requested_resources,
            allocable_resources,
            capacity_resources,
            descriptor,
        }
    }

    pub fn node(&self, node_name: &str) -> Option<&Arc<NodeInfo>> {
        self.nodes.iter().find(|n| n.node_name == node_name)
    }

    /// A new snapshot with `pod` bound to `node_name`. Every other node is
    /// shared with `self`.
    pub fn with_pod_on_node(&self, node_name: &str, pod: Arc<PodInfo>) -> ResourceResult<Self> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.node_name == node_name)
            .ok_or_else(|| ResourceError::UnknownNode {
                cluster: self.cluster_name.clone(),
                node: node_name.to_string(),
            })?;

        let mut next = self.clone();
        next.requested_resources.add(&pod.requested_resources);
        next.nodes[index] = Arc::new(self.nodes[index].with_pod(pod));
        Ok(next)
    }

    pub fn summary(&self) -> ResourceSummary {
        ResourceSummary {
            requested: Resources::from(&self.requested_resources),
            allocable: Resources::from(&self.allocable_resources),
            capacity: Resources::from(&self.capacity_resources),
        }
    }
}

// ── Snapshot loading ──────────────────────────────────────────────

/// A cluster described as raw descriptors, as read from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub cluster: ClusterDescriptor,
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node: Node,
    #[serde(default)]
    pub pods: Vec<Pod>,
}

impl ClusterSnapshot {
    /// Parse a JSON array of cluster snapshots.
    pub fn list_from_json(json: &str) -> ResourceResult<Vec<Self>> {
        serde_json::from_str(json).map_err(|e| ResourceError::Snapshot(e.to_string()))
    }

    /// Build the aggregate. Pods are bound to their node and carry the
    /// cluster's allocable and capacity figures.
    pub fn build(self) -> ResourceResult<ClusterInfo> {
        let cluster_name = self.cluster.name.clone();

        let mut allocable = Resource::default();
        let mut capacity = Resource::default();
        for entry in &self.nodes {
            allocable.add(&Resource::from_quantities(&entry.node.allocatable)?);
            capacity.add(&Resource::from_quantities(&entry.node.capacity)?);
        }
        let allocable = Resources::from(&allocable);
        let capacity = Resources::from(&capacity);

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for entry in self.nodes {
            let node_name = entry.node.name.clone();
            let pods = entry
                .pods
                .into_iter()
                .map(|pod| {
                    let name = pod.name.clone();
                    let info = PodInfo::new(Arc::new(pod))?
                        .with_cluster_context(allocable.clone(), capacity.clone())
                        .bound_to(&cluster_name, &node_name, &name);
                    Ok(Arc::new(info))
                })
                .collect::<ResourceResult<Vec<_>>>()?;
            nodes.push(Arc::new(NodeInfo::new(&cluster_name, Arc::new(entry.node), pods)?));
        }

        debug!(cluster = %cluster_name, nodes = nodes.len(), "cluster snapshot built");
        Ok(ClusterInfo::new(Arc::new(self.cluster), nodes))
    }
}

/// Build every snapshot, preserving order.
pub fn build_cluster_list(snapshots: Vec<ClusterSnapshot>) -> ResourceResult<ClusterInfoList> {
    snapshots.into_iter().map(ClusterSnapshot::build).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"[
        {
            "cluster": {"name": "edge", "region": "eu-west"},
            "nodes": [
                {
                    "node": {
                        "name": "edge-1",
                        "taints": [{"key": "foo", "value": "bar", "effect": "PreferNoSchedule"}],
                        "allocatable": {"cpu": "4", "memory": "8Gi"}
                    },
                    "pods": [
                        {"name": "web-0", "containers": [{"name": "web", "requests": {"cpu": "1", "memory": "1Gi"}}]}
                    ]
                },
                {
                    "node": {"name": "edge-2", "allocatable": {"cpu": "2", "memory": "4Gi"}}
                }
            ]
        },
        {"cluster": {"name": "empty"}}
    ]"#;

    #[test]
    fn builds_from_json() {
        let snapshots = ClusterSnapshot::list_from_json(SNAPSHOT).unwrap();
        let clusters = build_cluster_list(snapshots).unwrap();

        assert_eq!(clusters.len(), 2);
        let edge = &clusters[0];
        assert_eq!(edge.cluster_name, "edge");
        assert_eq!(edge.nodes.len(), 2);
        assert_eq!(edge.allocable_resources.milli_cpu, 6000);
        assert_eq!(edge.requested_resources.milli_cpu, 1000);
        assert_eq!(edge.descriptor.region.as_deref(), Some("eu-west"));

        let pod = &edge.nodes[0].pods[0];
        assert_eq!(pod.cluster_name, "edge");
        assert_eq!(pod.node_name, "edge-1");
        assert_eq!(
            pod.allocable_resources.as_ref().map(|r| r.cpu.as_str()),
            Some("6")
        );

        assert!(clusters[1].nodes.is_empty());
    }

    #[test]
    fn malformed_json_is_a_snapshot_error() {
        assert!(matches!(
            ClusterSnapshot::list_from_json("{not json"),
            Err(ResourceError::Snapshot(_))
        ));
    }

    #[test]
    fn with_pod_on_node_is_copy_on_refresh() {
        let clusters = build_cluster_list(ClusterSnapshot::list_from_json(SNAPSHOT).unwrap()).unwrap();
        let edge = &clusters[0];
        let pod = Arc::new(
            PodInfo::new(Arc::new(Pod::new("extra").with_requests(&[("cpu", "500m")]))).unwrap(),
        );

        let next = edge.with_pod_on_node("edge-2", pod).unwrap();

        assert_eq!(edge.requested_resources.milli_cpu, 1000);
        assert_eq!(next.requested_resources.milli_cpu, 1500);
        assert_eq!(next.node("edge-2").unwrap().pods.len(), 1);
        assert!(edge.node("edge-2").unwrap().pods.is_empty());
        assert!(Arc::ptr_eq(&edge.nodes[0], &next.nodes[0]));
    }

    #[test]
    fn unknown_node_is_reported() {
        let clusters = build_cluster_list(ClusterSnapshot::list_from_json(SNAPSHOT).unwrap()).unwrap();
        let pod = Arc::new(PodInfo::new(Arc::new(Pod::new("extra"))).unwrap());
        assert!(matches!(
            clusters[0].with_pod_on_node("nope", pod),
            Err(ResourceError::UnknownNode { .. })
        ));
    }

    #[test]
    fn summary_renders_display_strings() {
        let clusters = build_cluster_list(ClusterSnapshot::list_from_json(SNAPSHOT).unwrap()).unwrap();
        let summary = clusters[0].summary();
        assert_eq!(summary.allocable.cpu, "6");
        assert_eq!(summary.allocable.memory, "12.00Gi");
        assert_eq!(summary.requested.cpu, "1");
    }
}
