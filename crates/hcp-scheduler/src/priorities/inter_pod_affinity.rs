//! Prefer nodes whose topology domain holds pods the incoming pod likes,
//! and avoid those holding pods it dislikes.
//!
//! Domains are evaluated within the node's own cluster: two nodes share a
//! domain for a term iff both carry the term's topology key with the same
//! value. Both directions count: the incoming pod's preferred terms against
//! the pods already placed, and the placed pods' preferred terms against the
//! incoming pod.

use hcp_resource::{ClusterInfo, Labels, NodeInfo, Pod, PodInfo, WeightedAffinityTerm};

pub fn score(pod: &PodInfo, node: &NodeInfo, cluster: &ClusterInfo) -> i64 {
    let namespaces = &cluster.descriptor.namespaces;
    let incoming_ns = namespaces.get(&pod.pod.namespace);

    let mut total = 0i64;
    for other in &cluster.nodes {
        for existing in &other.pods {
            let existing_ns = namespaces.get(&existing.pod.namespace);
            total = total
                .saturating_add(weigh(&pod.preferred_affinity_terms, node, other, &existing.pod, existing_ns))
                .saturating_sub(weigh(&pod.preferred_anti_affinity_terms, node, other, &existing.pod, existing_ns));
        }
        for existing in &other.pods_with_affinity {
            total = total
                .saturating_add(weigh(&existing.preferred_affinity_terms, node, other, &pod.pod, incoming_ns))
                .saturating_sub(weigh(&existing.preferred_anti_affinity_terms, node, other, &pod.pod, incoming_ns));
        }
    }
    total
}

fn weigh(
    terms: &[WeightedAffinityTerm],
    candidate: &NodeInfo,
    other: &NodeInfo,
    target: &Pod,
    namespace_labels: Option<&Labels>,
) -> i64 {
    terms
        .iter()
        .filter(|weighted| {
            same_domain(candidate, other, &weighted.term.topology_key)
                && weighted.term.matches(target, namespace_labels)
        })
        .map(|weighted| i64::from(weighted.weight))
        .sum()
}

fn same_domain(a: &NodeInfo, b: &NodeInfo, topology_key: &str) -> bool {
    match (a.labels().get(topology_key), b.labels().get(topology_key)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hcp_resource::{
        Affinity, ClusterDescriptor, LabelSelector, Node, PodAffinity, PodAffinityTerm,
        WeightedPodAffinityTerm,
    };

    use super::*;

    fn term(weight: i32, app: &str) -> WeightedPodAffinityTerm {
        WeightedPodAffinityTerm {
            weight,
            pod_affinity_term: PodAffinityTerm {
                label_selector: Some(LabelSelector {
                    match_labels: [("app".to_string(), app.to_string())].into(),
                    match_expressions: Vec::new(),
                }),
                namespaces: Vec::new(),
                topology_key: "zone".to_string(),
                namespace_selector: None,
            },
        }
    }

    fn pod_info(pod: Pod) -> Arc<PodInfo> {
        Arc::new(PodInfo::new(Arc::new(pod)).unwrap())
    }

    fn with_preferences(pod: Pod, like: Vec<WeightedPodAffinityTerm>, avoid: Vec<WeightedPodAffinityTerm>) -> Pod {
        pod.with_affinity(Affinity {
            node_affinity: None,
            pod_affinity: Some(PodAffinity {
                required: Vec::new(),
                preferred: like,
            }),
            pod_anti_affinity: Some(PodAffinity {
                required: Vec::new(),
                preferred: avoid,
            }),
        })
    }

    fn node(name: &str, zone: &str, pods: Vec<Arc<PodInfo>>) -> Arc<NodeInfo> {
        let node = Node::new(name).with_labels(&[("zone", zone)]);
        Arc::new(NodeInfo::new("c", Arc::new(node), pods).unwrap())
    }

    fn cluster() -> ClusterInfo {
        let db = pod_info(Pod::new("db").with_labels(&[("app", "db")]));
        let web = pod_info(Pod::new("web").with_labels(&[("app", "web")]));
        ClusterInfo::new(
            Arc::new(ClusterDescriptor::new("c")),
            vec![
                node("a1", "a", vec![db]),
                node("a2", "a", Vec::new()),
                node("b1", "b", vec![web]),
            ],
        )
    }

    #[test]
    fn incoming_preferences_follow_the_topology_domain() {
        let cluster = cluster();
        let incoming = pod_info(with_preferences(
            Pod::new("api"),
            vec![term(40, "db")],
            vec![term(10, "web")],
        ));

        let scores: Vec<i64> = cluster
            .nodes
            .iter()
            .map(|n| score(&incoming, n, &cluster))
            .collect();
        assert_eq!(scores, vec![40, 40, -10]);
    }

    #[test]
    fn existing_pod_preferences_count_too() {
        let cache = pod_info(with_preferences(
            Pod::new("cache").with_labels(&[("app", "cache")]),
            vec![term(25, "api")],
            Vec::new(),
        ));
        let cluster = ClusterInfo::new(
            Arc::new(ClusterDescriptor::new("c")),
            vec![node("a1", "a", vec![cache]), node("b1", "b", Vec::new())],
        );
        let incoming = pod_info(Pod::new("api").with_labels(&[("app", "api")]));

        assert_eq!(score(&incoming, &cluster.nodes[0], &cluster), 25);
        assert_eq!(score(&incoming, &cluster.nodes[1], &cluster), 0);
    }

    #[test]
    fn pod_with_parse_error_has_no_preferences() {
        let cluster = cluster();
        let mut broken = term(40, "db");
        broken.weight = 0;
        let incoming = pod_info(with_preferences(Pod::new("api"), vec![broken], Vec::new()));

        assert!(incoming.parse_error.is_some());
        assert_eq!(score(&incoming, &cluster.nodes[0], &cluster), 0);
    }
}
