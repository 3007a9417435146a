//! Scoring engine: runs priority functions over every candidate node,
//! aggregates node scores per cluster and ranks the clusters.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use hcp_resource::{ClusterInfo, ClusterInfoList, NodeInfo, Pod, PodInfo};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ReplicaStrategy, SchedulerConfig};
use crate::error::{ScoringError, ScoringResult};
use crate::priorities::{PriorityRegistry, RegisteredPriority, normalize};

/// One node's contribution to its cluster's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeScore {
    pub node_name: String,
    /// Weighted sum of the normalized priority scores.
    pub score: f64,
    /// Normalized (unweighted) score per priority function.
    pub breakdown: BTreeMap<String, i64>,
}

/// A ranked candidate cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterScore {
    pub cluster_name: String,
    /// Mean of the cluster's node scores.
    pub score: f64,
    /// Best node first.
    pub node_scores: Vec<NodeScore>,
}

impl ClusterScore {
    pub fn best_node(&self) -> Option<&NodeScore> {
        self.node_scores.first()
    }
}

/// Where one replica goes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaPlacement {
    pub replica: u32,
    pub cluster_name: String,
    pub node_name: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: SchedulerConfig,
    registry: PriorityRegistry,
}

impl ScoringEngine {
    pub fn new(config: SchedulerConfig) -> ScoringResult<Self> {
        let registry = PriorityRegistry::from_config(&config)?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &PriorityRegistry {
        &self.registry
    }

    /// Rank `clusters` for `pod` using the single priority `priority`.
    pub fn scoring(
        &self,
        pod: Option<&Pod>,
        clusters: &[ClusterInfo],
        priority: &str,
    ) -> ScoringResult<Vec<ClusterScore>> {
        let registered = self.registry.lookup(priority)?;
        let pod = self.prepare(pod, clusters)?;
        self.rank(&pod, clusters, &[registered])
    }

    /// Rank `clusters` for `pod` using every priority the policy enables.
    pub fn score_policy(&self, pod: Option<&Pod>, clusters: &[ClusterInfo]) -> ScoringResult<Vec<ClusterScore>> {
        let pod = self.prepare(pod, clusters)?;
        self.rank(&pod, clusters, self.registry.enabled())
    }

    /// The best cluster for `pod`. Without `priority` the whole policy is used.
    pub fn select(
        &self,
        pod: Option<&Pod>,
        clusters: &[ClusterInfo],
        priority: Option<&str>,
    ) -> ScoringResult<ClusterScore> {
        let ranking = match priority {
            Some(name) => self.scoring(pod, clusters, name)?,
            None => self.score_policy(pod, clusters)?,
        };
        ranking.into_iter().next().ok_or(ScoringError::NoFeasibleCluster)
    }

    /// Choose a cluster and node for each of `replicas` copies of `pod`
    /// under the configured [`ReplicaStrategy`]. Without `priority` the
    /// whole policy is used.
    pub fn place_replicas(
        &self,
        pod: Option<&Pod>,
        clusters: &[ClusterInfo],
        priority: Option<&str>,
        replicas: u32,
    ) -> ScoringResult<Vec<ReplicaPlacement>> {
        let named = priority.map(|name| self.registry.lookup(name)).transpose()?;
        if replicas == 0 {
            return Err(ScoringError::InvalidScoringInput("replica count is zero".to_string()));
        }
        let pod_info = self.prepare(pod, clusters)?;
        let priorities = match &named {
            Some(registered) => std::slice::from_ref(registered),
            None => self.registry.enabled(),
        };

        let mut placements = Vec::with_capacity(replicas as usize);
        match self.config.replica_strategy {
            ReplicaStrategy::Greedy => {
                // The snapshot never changes between replicas, so neither does the ranking.
                let ranking = self.rank(&pod_info, clusters, priorities)?;
                for replica in 0..replicas {
                    placements.push(placement(replica, &ranking)?);
                }
            }
            ReplicaStrategy::Spread => {
                let mut snapshot: Cow<'_, [ClusterInfo]> = Cow::Borrowed(clusters);
                for replica in 0..replicas {
                    let ranking = self.rank(&pod_info, &snapshot, priorities)?;
                    let chosen = placement(replica, &ranking)?;

                    let index = snapshot
                        .iter()
                        .position(|c| c.cluster_name == chosen.cluster_name)
                        .ok_or(ScoringError::NoFeasibleCluster)?;
                    let bound = pod_info.bound_to(
                        &chosen.cluster_name,
                        &chosen.node_name,
                        &format!("{}-{replica}", pod_info.pod_name),
                    );
                    let refreshed = snapshot[index].with_pod_on_node(&chosen.node_name, Arc::new(bound))?;
                    snapshot.to_mut()[index] = refreshed;

                    placements.push(chosen);
                }
            }
        }

        for p in &placements {
            info!(
                pod = %pod_info.pod_name,
                replica = p.replica,
                cluster = %p.cluster_name,
                node = %p.node_name,
                score = p.score,
                "replica placed"
            );
        }
        Ok(placements)
    }

    /// Run a scoring call on the blocking pool and abandon it after
    /// `timeout`. Without `priority` the whole policy is used.
    pub async fn scoring_with_timeout(
        &self,
        pod: Arc<Pod>,
        clusters: Arc<ClusterInfoList>,
        priority: Option<String>,
        timeout: Duration,
    ) -> ScoringResult<Vec<ClusterScore>> {
        let engine = self.clone();
        let task = tokio::task::spawn_blocking(move || match priority.as_deref() {
            Some(name) => engine.scoring(Some(&pod), &clusters, name),
            None => engine.score_policy(Some(&pod), &clusters),
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ScoringError::Task(e.to_string())),
            Err(_) => {
                warn!(?timeout, "scoring call abandoned");
                Err(ScoringError::Timeout(timeout))
            }
        }
    }

    fn prepare(&self, pod: Option<&Pod>, clusters: &[ClusterInfo]) -> ScoringResult<PodInfo> {
        let pod = pod.ok_or_else(|| ScoringError::InvalidScoringInput("pod is missing".to_string()))?;
        if clusters.is_empty() {
            return Err(ScoringError::InvalidScoringInput("cluster list is empty".to_string()));
        }
        Ok(PodInfo::new(Arc::new(pod.clone()))?)
    }

    fn rank(
        &self,
        pod: &PodInfo,
        clusters: &[ClusterInfo],
        priorities: &[RegisteredPriority],
    ) -> ScoringResult<Vec<ClusterScore>> {
        let feasible: Vec<&ClusterInfo> = clusters
            .iter()
            .filter(|cluster| {
                let has_nodes = !cluster.nodes.is_empty();
                if !has_nodes {
                    debug!(cluster = %cluster.cluster_name, "excluding cluster with no nodes");
                }
                has_nodes
            })
            .collect();
        if feasible.is_empty() {
            return Err(ScoringError::NoFeasibleCluster);
        }

        let targets: Vec<(usize, &ClusterInfo, &NodeInfo)> = feasible
            .iter()
            .enumerate()
            .flat_map(|(index, cluster)| {
                cluster.nodes.iter().map(move |node| (index, *cluster, node.as_ref()))
            })
            .collect();
        for (_, cluster, node) in &targets {
            if node.is_overcommitted() {
                debug!(cluster = %cluster.cluster_name, node = %node.node_name, "node is overcommitted");
            }
        }

        let max_priority = self.config.max_priority;
        let mut totals = vec![0.0_f64; targets.len()];
        let mut breakdowns = vec![BTreeMap::new(); targets.len()];

        for priority in priorities {
            let raw: Vec<Option<i64>> = targets
                .par_iter()
                .map(|(_, cluster, node)| match priority.kind.score(pod, node, cluster, max_priority) {
                    Ok(score) => Some(score),
                    // None of the built-in functions fail today.
                    Err(e) => {
                        warn!(
                            priority = %priority.kind,
                            cluster = %cluster.cluster_name,
                            node = %node.node_name,
                            error = %e,
                            "priority failed, node degraded to lowest score"
                        );
                        None
                    }
                })
                .collect();

            let normalized = normalize(&raw, priority.kind.normalization(), max_priority);
            for (i, score) in normalized.into_iter().enumerate() {
                totals[i] += priority.weight.saturating_mul(score) as f64;
                breakdowns[i].insert(priority.kind.name().to_string(), score);
            }
        }

        let mut by_cluster: Vec<ClusterScore> = feasible
            .iter()
            .map(|cluster| ClusterScore {
                cluster_name: cluster.cluster_name.clone(),
                score: 0.0,
                node_scores: Vec::with_capacity(cluster.nodes.len()),
            })
            .collect();
        for (((index, _, node), total), breakdown) in targets.iter().zip(totals).zip(breakdowns) {
            by_cluster[*index].node_scores.push(NodeScore {
                node_name: node.node_name.clone(),
                score: total,
                breakdown,
            });
        }

        for cluster in &mut by_cluster {
            let sum: f64 = cluster.node_scores.iter().map(|n| n.score).sum();
            cluster.score = sum / cluster.node_scores.len() as f64;
            cluster.node_scores.sort_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| a.node_name.cmp(&b.node_name))
            });
            debug!(
                cluster = %cluster.cluster_name,
                nodes = cluster.node_scores.len(),
                score = cluster.score,
                "cluster scored"
            );
        }

        by_cluster.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.cluster_name.cmp(&b.cluster_name))
        });
        Ok(by_cluster)
    }
}

fn placement(replica: u32, ranking: &[ClusterScore]) -> ScoringResult<ReplicaPlacement> {
    let best = ranking.first().ok_or(ScoringError::NoFeasibleCluster)?;
    let node = best.best_node().ok_or(ScoringError::NoFeasibleCluster)?;
    Ok(ReplicaPlacement {
        replica,
        cluster_name: best.cluster_name.clone(),
        node_name: node.node_name.clone(),
        score: best.score,
    })
}

#[cfg(test)]
mod tests {
    use hcp_resource::{ClusterDescriptor, Node, Taint, TaintEffect};

    use super::*;

    fn cluster(name: &str, nodes: Vec<Node>) -> ClusterInfo {
        let nodes = nodes
            .into_iter()
            .map(|n| Arc::new(NodeInfo::new(name, Arc::new(n), Vec::new()).unwrap()))
            .collect();
        ClusterInfo::new(Arc::new(ClusterDescriptor::new(name)), nodes)
    }

    fn tainted(name: &str, keys: &[&str]) -> Node {
        Node::new(name).with_taints(
            keys.iter()
                .map(|k| Taint::new(k, "x", TaintEffect::PreferNoSchedule))
                .collect(),
        )
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(SchedulerConfig::default()).unwrap()
    }

    #[test]
    fn cluster_score_is_mean_of_node_scores() {
        let clusters = vec![
            cluster("mixed", vec![tainted("clean", &[]), tainted("dirty", &["a"])]),
            cluster("clean", vec![tainted("n", &[])]),
        ];
        let ranking = engine().scoring(Some(&Pod::new("p")), &clusters, "TaintToleration").unwrap();

        assert_eq!(ranking[0].cluster_name, "clean");
        assert_eq!(ranking[0].score, 10.0);
        assert_eq!(ranking[1].cluster_name, "mixed");
        assert_eq!(ranking[1].score, 5.0);
        assert_eq!(ranking[1].node_scores[0].node_name, "clean");
        assert_eq!(ranking[1].node_scores[1].breakdown["TaintToleration"], 0);
    }

    #[test]
    fn weight_multiplies_the_score() {
        let config = SchedulerConfig {
            priorities: vec![crate::config::PriorityConfig::new("TaintToleration", 3)],
            ..SchedulerConfig::default()
        };
        let engine = ScoringEngine::new(config).unwrap();
        let clusters = vec![cluster("c", vec![tainted("n", &[])])];

        let ranking = engine.score_policy(Some(&Pod::new("p")), &clusters).unwrap();
        assert_eq!(ranking[0].score, 30.0);
        assert_eq!(ranking[0].node_scores[0].breakdown["TaintToleration"], 10);
    }

    #[test]
    fn empty_clusters_are_excluded() {
        let clusters = vec![cluster("empty", Vec::new()), cluster("one", vec![tainted("n", &["a"])])];
        let ranking = engine().scoring(Some(&Pod::new("p")), &clusters, "TaintToleration").unwrap();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].cluster_name, "one");
    }

    #[test]
    fn select_returns_the_top_entry() {
        let clusters = vec![
            cluster("b", vec![tainted("n", &["a"])]),
            cluster("a", vec![tainted("n", &[])]),
        ];
        let best = engine().select(Some(&Pod::new("p")), &clusters, None).unwrap();
        assert_eq!(best.cluster_name, "a");
        assert_eq!(best.best_node().unwrap().node_name, "n");
    }

    #[test]
    fn zero_replicas_is_invalid() {
        let clusters = vec![cluster("c", vec![tainted("n", &[])])];
        assert!(matches!(
            engine().place_replicas(Some(&Pod::new("p")), &clusters, None, 0),
            Err(ScoringError::InvalidScoringInput(_))
        ));
    }

    #[test]
    fn malformed_pod_request_is_an_error() {
        let clusters = vec![cluster("c", vec![tainted("n", &[])])];
        let pod = Pod::new("p").with_requests(&[("cpu", "lots")]);
        assert!(matches!(
            engine().scoring(Some(&pod), &clusters, "TaintToleration"),
            Err(ScoringError::Resource(_))
        ));
    }
}
