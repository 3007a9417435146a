use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use hcp_resource::{ClusterSnapshot, Pod, ResourceSummary, build_cluster_list};
use hcp_scheduler::{ClusterScore, ReplicaPlacement, ReplicaStrategy, SchedulerConfig, ScoringEngine};
use serde::Serialize;
use tracing::info;

pub struct ScoreArgs<'a> {
    pub config: Option<&'a str>,
    pub snapshot: &'a str,
    pub pod: &'a str,
    pub priority: Option<&'a str>,
    pub replicas: Option<u32>,
    pub format: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ScoreReport {
    pub pod: String,
    pub priority: String,
    pub ranking: Vec<ClusterScore>,
    pub clusters: Vec<ClusterSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_strategy: Option<ReplicaStrategy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub placements: Vec<ReplicaPlacement>,
}

#[derive(Debug, Serialize)]
pub struct ClusterSummary {
    pub name: String,
    pub nodes: usize,
    pub resources: ResourceSummary,
}

pub fn score(args: &ScoreArgs<'_>) -> anyhow::Result<()> {
    let report = build_report(args)?;

    match args.format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print!("{}", format_report(&report));
        }
    }

    Ok(())
}

pub fn build_report(args: &ScoreArgs<'_>) -> anyhow::Result<ScoreReport> {
    let config = match args.config {
        Some(path) => SchedulerConfig::from_file(Path::new(path))
            .with_context(|| format!("loading config {path}"))?,
        None => SchedulerConfig::default(),
    };
    let engine = ScoringEngine::new(config)?;

    let snapshot = std::fs::read_to_string(args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot))?;
    let clusters = build_cluster_list(ClusterSnapshot::list_from_json(&snapshot)?)?;
    info!(
        clusters = clusters.len(),
        nodes = clusters.iter().map(|c| c.nodes.len()).sum::<usize>(),
        "snapshot loaded"
    );

    let pod_json =
        std::fs::read_to_string(args.pod).with_context(|| format!("reading pod {}", args.pod))?;
    let pod: Pod = serde_json::from_str(&pod_json).with_context(|| format!("parsing pod {}", args.pod))?;

    let ranking = match args.priority {
        Some(name) => engine.scoring(Some(&pod), &clusters, name)?,
        None => engine.score_policy(Some(&pod), &clusters)?,
    };
    let placements = match args.replicas {
        Some(n) => engine.place_replicas(Some(&pod), &clusters, args.priority, n)?,
        None => Vec::new(),
    };

    let priority = match args.priority {
        Some(name) => name.to_string(),
        None => engine
            .registry()
            .enabled()
            .iter()
            .map(|p| format!("{}:{}", p.kind, p.weight))
            .collect::<Vec<_>>()
            .join(" + "),
    };

    Ok(ScoreReport {
        pod: pod.name,
        priority,
        ranking,
        clusters: clusters
            .iter()
            .map(|c| ClusterSummary {
                name: c.cluster_name.clone(),
                nodes: c.nodes.len(),
                resources: c.summary(),
            })
            .collect(),
        replica_strategy: args.replicas.map(|_| engine.config().replica_strategy),
        placements,
    })
}

pub fn format_report(report: &ScoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Pod {} scored with {}", report.pod, report.priority);
    let _ = writeln!(out);

    for (rank, cluster) in report.ranking.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {:<24} {:>8.2}", rank + 1, cluster.cluster_name, cluster.score);
        if let Some(summary) = report.clusters.iter().find(|s| s.name == cluster.cluster_name) {
            let r = &summary.resources;
            let _ = writeln!(
                out,
                "    cpu {}/{}  memory {}/{}",
                r.requested.cpu, r.allocable.cpu, r.requested.memory, r.allocable.memory
            );
        }
        for node in &cluster.node_scores {
            let _ = writeln!(out, "    - {:<22} {:>8.2}", node.node_name, node.score);
        }
    }

    let excluded: Vec<&str> = report
        .clusters
        .iter()
        .filter(|s| !report.ranking.iter().any(|c| c.cluster_name == s.name))
        .map(|s| s.name.as_str())
        .collect();
    if !excluded.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Excluded (no nodes): {}", excluded.join(", "));
    }

    if !report.placements.is_empty() {
        let _ = writeln!(out);
        match report.replica_strategy {
            Some(strategy) => {
                let _ = writeln!(out, "Placements ({strategy}):");
            }
            None => {
                let _ = writeln!(out, "Placements:");
            }
        }
        for p in &report.placements {
            let _ = writeln!(out, "    replica {} -> {}/{}", p.replica, p.cluster_name, p.node_name);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"[
        {"cluster": {"name": "spot"}, "nodes": [
            {"node": {"name": "s1", "allocatable": {"cpu": "4", "memory": "8Gi"},
                      "taints": [{"key": "spot", "value": "true", "effect": "PreferNoSchedule"}]}}
        ]},
        {"cluster": {"name": "steady"}, "nodes": [
            {"node": {"name": "d1", "allocatable": {"cpu": "4", "memory": "8Gi"}}}
        ]},
        {"cluster": {"name": "drained"}}
    ]"#;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn builds_and_formats_a_report() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write(&dir, "snapshot.json", SNAPSHOT);
        let pod = write(&dir, "pod.json", r#"{"name": "web"}"#);
        let config = write(&dir, "policy.toml", "replica_strategy = \"greedy\"\n");

        let report = build_report(&ScoreArgs {
            config: Some(&config),
            snapshot: &snapshot,
            pod: &pod,
            priority: None,
            replicas: Some(2),
            format: "text",
        })
        .unwrap();

        assert_eq!(report.ranking[0].cluster_name, "steady");
        assert_eq!(report.placements.len(), 2);
        assert_eq!(report.priority, "TaintToleration:1");

        let text = format_report(&report);
        assert!(text.contains("steady"));
        assert!(text.contains("cpu 0/4"));
        assert!(text.contains("Excluded (no nodes): drained"));
        assert!(text.contains("Placements (greedy):"));
        assert!(text.contains("replica 1 -> steady/d1"));
    }

    #[test]
    fn replicas_follow_the_named_priority() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write(
            &dir,
            "snapshot.json",
            r#"[
                {"cluster": {"name": "a-tainted"}, "nodes": [
                    {"node": {"name": "a1", "labels": {"zone": "z1"},
                              "taints": [{"key": "spot", "value": "true", "effect": "PreferNoSchedule"}]}}
                ]},
                {"cluster": {"name": "b-clean"}, "nodes": [{"node": {"name": "b1"}}]}
            ]"#,
        );
        let pod = write(
            &dir,
            "pod.json",
            r#"{"name": "web", "affinity": {"nodeAffinity": {
                "preferredDuringSchedulingIgnoredDuringExecution": [
                    {"weight": 10, "preference": {"matchExpressions": [
                        {"key": "zone", "operator": "In", "values": ["z1"]}]}}
                ]}}}"#,
        );
        let config = write(
            &dir,
            "policy.toml",
            "[[priorities]]\nname = \"NodeAffinity\"\nweight = 1\n",
        );

        let report = build_report(&ScoreArgs {
            config: Some(&config),
            snapshot: &snapshot,
            pod: &pod,
            priority: Some("TaintToleration"),
            replicas: Some(1),
            format: "text",
        })
        .unwrap();

        assert_eq!(report.ranking[0].cluster_name, "b-clean");
        assert_eq!(report.placements[0].cluster_name, "b-clean");
        assert_eq!(report.placements[0].node_name, "b1");
    }

    #[test]
    fn missing_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pod = write(&dir, "pod.json", r#"{"name": "web"}"#);
        let err = build_report(&ScoreArgs {
            config: None,
            snapshot: "/nonexistent/snapshot.json",
            pod: &pod,
            priority: Some("TaintToleration"),
            replicas: None,
            format: "json",
        })
        .unwrap_err();
        assert!(err.to_string().contains("reading snapshot"));
    }
}
