//! Prefer nodes whose `PreferNoSchedule` taints the pod tolerates.
//!
//! The raw score is the number of intolerable `PreferNoSchedule` taints on
//! the node. `NoSchedule` and `NoExecute` taints, and tolerations limited to
//! those effects, belong to the filtering stage and are ignored here.

use hcp_resource::{NodeInfo, Pod, PodInfo, TaintEffect, Toleration};
use tracing::warn;

pub fn score(pod: &PodInfo, node: &NodeInfo) -> i64 {
    let tolerations = prefer_no_schedule_tolerations(&pod.pod);
    intolerable_taints(node, &tolerations)
}

/// Tolerations that can match a `PreferNoSchedule` taint. Malformed entries
/// are logged and treated as absent.
fn prefer_no_schedule_tolerations(pod: &Pod) -> Vec<&Toleration> {
    pod.tolerations
        .iter()
        .filter(|toleration| {
            let checked = toleration
                .checked_operator()
                .and_then(|_| toleration.checked_effect());
            match checked {
                Ok(None | Some(TaintEffect::PreferNoSchedule)) => true,
                Ok(Some(_)) => false,
                Err(e) => {
                    warn!(pod = %pod.name, error = %e, "ignoring malformed toleration");
                    false
                }
            }
        })
        .collect()
}

fn intolerable_taints(node: &NodeInfo, tolerations: &[&Toleration]) -> i64 {
    let count = node
        .taints()
        .iter()
        .filter(|taint| match taint.checked_effect() {
            Ok(TaintEffect::PreferNoSchedule) => !tolerations
                .iter()
                .any(|toleration| matches!(toleration.tolerates(taint), Ok(true))),
            Ok(_) => false,
            Err(e) => {
                warn!(
                    cluster = %node.cluster_name,
                    node = %node.node_name,
                    error = %e,
                    "ignoring malformed taint"
                );
                false
            }
        })
        .count();
    i64::try_from(count).unwrap_or(i64::MAX)
}
