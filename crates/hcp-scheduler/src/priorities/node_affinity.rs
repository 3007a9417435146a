//! Prefer nodes matching the pod's preferred node-affinity terms.

use hcp_resource::affinity::MAX_TERM_WEIGHT;
use hcp_resource::{NodeInfo, PodInfo, Selector};
use tracing::warn;

/// Sum of the weights of the preferred terms whose selector matches the
/// node's labels. Unusable terms are logged and skipped, and a pod whose
/// affinity rules failed to parse has no preferences at all.
pub fn score(pod: &PodInfo, node: &NodeInfo) -> i64 {
    if pod.parse_error.is_some() {
        return 0;
    }
    let Some(node_affinity) = pod
        .pod
        .affinity
        .as_ref()
        .and_then(|affinity| affinity.node_affinity.as_ref())
    else {
        return 0;
    };

    node_affinity
        .preferred
        .iter()
        .filter_map(|term| {
            if !(1..=MAX_TERM_WEIGHT).contains(&term.weight) {
                warn!(pod = %pod.pod_name, weight = term.weight, "ignoring node affinity term with invalid weight");
                return None;
            }
            match Selector::from_node_selector_term(&term.preference) {
                Ok(selector) => selector.matches(node.labels()).then_some(i64::from(term.weight)),
                Err(e) => {
                    warn!(pod = %pod.pod_name, error = %e, "ignoring malformed node affinity term");
                    None
                }
            }
        })
        .sum()
}
