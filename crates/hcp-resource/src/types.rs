//! Descriptor types handed over by the orchestration layer.
//!
//! These carry the placement-relevant subset of the control plane's pod,
//! node and cluster objects. Enum-like fields (taint effects, toleration
//! operators, selector operators) stay as the raw strings received and are
//! resolved on access, so one bad entry can be reported and skipped without
//! failing deserialization of a whole snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, ResourceResult};

/// Label set on a pod, node, cluster or namespace.
pub type Labels = BTreeMap<String, String>;

/// Resource name → quantity string (`"500m"`, `"2Gi"`, ...).
pub type QuantityMap = BTreeMap<String, String>;

const DEFAULT_NAMESPACE: &str = "default";

static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?[A-Za-z0-9]([-A-Za-z0-9_.]{0,61}[A-Za-z0-9])?$",
    )
    .expect("qualified name pattern is valid")
});

/// Whether `key` is a qualified name (`[dns-prefix/]name`).
pub fn is_qualified_name(key: &str) -> bool {
    let prefix_ok = match key.split_once('/') {
        Some((prefix, _)) => prefix.len() <= 253,
        None => true,
    };
    prefix_ok && QUALIFIED_NAME.is_match(key)
}

// ── Taints and tolerations ─────────────────────────────────────────

/// Effect of a node taint on pods that do not tolerate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

impl TaintEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSchedule => "NoSchedule",
            Self::PreferNoSchedule => "PreferNoSchedule",
            Self::NoExecute => "NoExecute",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NoSchedule" => Some(Self::NoSchedule),
            "PreferNoSchedule" => Some(Self::PreferNoSchedule),
            "NoExecute" => Some(Self::NoExecute),
            _ => None,
        }
    }
}

impl fmt::Display for TaintEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator of a toleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TolerationOperator {
    Equal,
    Exists,
}

/// A node-attached marker repelling pods without a matching toleration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: String,
}

impl Taint {
    pub fn new(key: &str, value: &str, effect: TaintEffect) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            effect: effect.as_str().to_string(),
        }
    }

    /// Validate the taint and resolve its effect.
    pub fn checked_effect(&self) -> ResourceResult<TaintEffect> {
        if !is_qualified_name(&self.key) {
            return Err(ResourceError::MalformedTaint {
                key: self.key.clone(),
                reason: "key is not a qualified name".to_string(),
            });
        }
        TaintEffect::parse(&self.effect).ok_or_else(|| ResourceError::MalformedTaint {
            key: self.key.clone(),
            reason: format!("unknown effect {:?}", self.effect),
        })
    }
}

impl fmt::Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}:{}", self.key, self.value, self.effect)
    }
}

/// A pod-attached rule allowing the pod to disregard matching taints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub effect: String,
}

impl Toleration {
    pub fn equal(key: &str, value: &str, effect: TaintEffect) -> Self {
        Self {
            key: key.to_string(),
            operator: "Equal".to_string(),
            value: value.to_string(),
            effect: effect.as_str().to_string(),
        }
    }

    /// Tolerate every taint carrying `key`, whatever its value. An empty
    /// `effect` matches all effects.
    pub fn exists(key: &str, effect: Option<TaintEffect>) -> Self {
        Self {
            key: key.to_string(),
            operator: "Exists".to_string(),
            value: String::new(),
            effect: effect.map(|e| e.as_str().to_string()).unwrap_or_default(),
        }
    }

    /// Resolve the operator. An empty operator means `Equal`.
    pub fn checked_operator(&self) -> ResourceResult<TolerationOperator> {
        match self.operator.as_str() {
            "" | "Equal" => Ok(TolerationOperator::Equal),
            "Exists" => Ok(TolerationOperator::Exists),
            other => Err(ResourceError::MalformedToleration {
                key: self.key.clone(),
                reason: format!("unknown operator {other:?}"),
            }),
        }
    }

    /// Resolve the effect. `None` means the toleration applies to all effects.
    pub fn checked_effect(&self) -> ResourceResult<Option<TaintEffect>> {
        if self.effect.is_empty() {
            return Ok(None);
        }
        TaintEffect::parse(&self.effect)
            .map(Some)
            .ok_or_else(|| ResourceError::MalformedToleration {
                key: self.key.clone(),
                reason: format!("unknown effect {:?}", self.effect),
            })
    }

    /// Whether this toleration matches `taint`.
    ///
    /// Key must be equal unless the toleration key is empty, the effect must
    /// be equal unless the toleration effect is empty, and `Equal` compares
    /// values while `Exists` ignores them.
    pub fn tolerates(&self, taint: &Taint) -> ResourceResult<bool> {
        let operator = self.checked_operator()?;
        if let Some(effect) = self.checked_effect()? {
            if effect.as_str() != taint.effect {
                return Ok(false);
            }
        }
        if !self.key.is_empty() && self.key != taint.key {
            return Ok(false);
        }
        Ok(match operator {
            TolerationOperator::Exists => true,
            TolerationOperator::Equal => self.value == taint.value,
        })
    }
}

// ── Selectors ─────────────────────────────────────────────────────

/// A label query as written in a pod spec.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: Labels,
    #[serde(default)]
    pub match_expressions: Vec<SelectorRequirement>,
}

/// One `key operator values` clause of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl SelectorRequirement {
    pub fn new(key: &str, operator: &str, values: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            operator: operator.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// A node selector term; requirements are ANDed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorTerm {
    #[serde(default)]
    pub match_expressions: Vec<SelectorRequirement>,
}

/// A soft node-affinity preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredSchedulingTerm {
    pub weight: i32,
    pub preference: NodeSelectorTerm,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeAffinity {
    #[serde(default, rename = "requiredDuringSchedulingIgnoredDuringExecution")]
    pub required: Vec<NodeSelectorTerm>,
    #[serde(default, rename = "preferredDuringSchedulingIgnoredDuringExecution")]
    pub preferred: Vec<PreferredSchedulingTerm>,
}

/// A set of pods, selected by labels and namespaces, co-located by topology.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodAffinityTerm {
    #[serde(default)]
    pub label_selector: Option<LabelSelector>,
    #[serde(default)]
    pub namespaces: Vec<String>,
    pub topology_key: String,
    #[serde(default)]
    pub namespace_selector: Option<LabelSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedPodAffinityTerm {
    pub weight: i32,
    pub pod_affinity_term: PodAffinityTerm,
}

/// Pod affinity or anti-affinity rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PodAffinity {
    #[serde(default, rename = "requiredDuringSchedulingIgnoredDuringExecution")]
    pub required: Vec<PodAffinityTerm>,
    #[serde(default, rename = "preferredDuringSchedulingIgnoredDuringExecution")]
    pub preferred: Vec<WeightedPodAffinityTerm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affinity {
    #[serde(default)]
    pub node_affinity: Option<NodeAffinity>,
    #[serde(default)]
    pub pod_affinity: Option<PodAffinity>,
    #[serde(default)]
    pub pod_anti_affinity: Option<PodAffinity>,
}

// ── Pod ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub requests: QuantityMap,
}

/// The immutable pod descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub init_containers: Vec<Container>,
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
    #[serde(default)]
    pub affinity: Option<Affinity>,
    #[serde(default)]
    pub node_name: Option<String>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Pod {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: default_namespace(),
            labels: Labels::new(),
            containers: Vec::new(),
            init_containers: Vec::new(),
            tolerations: Vec::new(),
            affinity: None,
            node_name: None,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn with_labels(mut self, labels: &[(&str, &str)]) -> Self {
        self.labels = to_labels(labels);
        self
    }

    pub fn with_tolerations(mut self, tolerations: Vec<Toleration>) -> Self {
        self.tolerations = tolerations;
        self
    }

    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = Some(affinity);
        self
    }

    /// Add a container named after the pod with the given requests.
    pub fn with_requests(mut self, requests: &[(&str, &str)]) -> Self {
        self.containers.push(Container {
            name: format!("{}-{}", self.name, self.containers.len()),
            requests: to_labels(requests),
        });
        self
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// The raw node descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub allocatable: QuantityMap,
    #[serde(default)]
    pub capacity: QuantityMap,
}

impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_labels(mut self, labels: &[(&str, &str)]) -> Self {
        self.labels = to_labels(labels);
        self
    }

    pub fn with_taints(mut self, taints: Vec<Taint>) -> Self {
        self.taints = taints;
        self
    }

    /// Set allocatable resources; capacity mirrors them unless set later.
    pub fn with_allocatable(mut self, allocatable: &[(&str, &str)]) -> Self {
        self.allocatable = to_labels(allocatable);
        if self.capacity.is_empty() {
            self.capacity = self.allocatable.clone();
        }
        self
    }

    pub fn with_capacity(mut self, capacity: &[(&str, &str)]) -> Self {
        self.capacity = to_labels(capacity);
        self
    }
}

// ── Cluster ───────────────────────────────────────────────────────

/// The native cluster descriptor, kept on `ClusterInfo` for display.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub region: Option<String>,
    /// Namespace name → namespace labels, for namespace selectors.
    #[serde(default)]
    pub namespaces: BTreeMap<String, Labels>,
}

impl ClusterDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

fn to_labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names() {
        assert!(is_qualified_name("foo"));
        assert!(is_qualified_name("node.kubernetes.io/unreachable"));
        assert!(is_qualified_name("cpu-type"));
        assert!(!is_qualified_name(""));
        assert!(!is_qualified_name("-foo"));
        assert!(!is_qualified_name("Bad.Prefix/foo"));
        assert!(!is_qualified_name(&"x".repeat(64)));
    }

    #[test]
    fn taint_effect_is_validated() {
        let taint = Taint::new("foo", "bar", TaintEffect::PreferNoSchedule);
        assert_eq!(taint.checked_effect().unwrap(), TaintEffect::PreferNoSchedule);

        let bad = Taint {
            key: "foo".to_string(),
            value: String::new(),
            effect: "Sometimes".to_string(),
        };
        assert!(matches!(bad.checked_effect(), Err(ResourceError::MalformedTaint { .. })));

        let bad_key = Taint {
            key: "not a key".to_string(),
            value: String::new(),
            effect: "NoSchedule".to_string(),
        };
        assert!(bad_key.checked_effect().is_err());
    }

    #[test]
    fn equal_requires_value_match() {
        let taint = Taint::new("foo", "bar", TaintEffect::PreferNoSchedule);
        let tol = Toleration::equal("foo", "bar", TaintEffect::PreferNoSchedule);
        assert!(tol.tolerates(&taint).unwrap());

        let other = Toleration::equal("foo", "blah", TaintEffect::PreferNoSchedule);
        assert!(!other.tolerates(&taint).unwrap());
    }

    #[test]
    fn empty_operator_means_equal() {
        let taint = Taint::new("foo", "bar", TaintEffect::NoSchedule);
        let tol = Toleration {
            key: "foo".to_string(),
            operator: String::new(),
            value: "bar".to_string(),
            effect: String::new(),
        };
        assert_eq!(tol.checked_operator().unwrap(), TolerationOperator::Equal);
        assert!(tol.tolerates(&taint).unwrap());
    }

    #[test]
    fn exists_ignores_value() {
        let taint = Taint::new("foo", "anything", TaintEffect::PreferNoSchedule);
        assert!(Toleration::exists("foo", None).tolerates(&taint).unwrap());
        assert!(!Toleration::exists("bar", None).tolerates(&taint).unwrap());
    }

    #[test]
    fn empty_key_is_wildcard() {
        let taint = Taint::new("foo", "bar", TaintEffect::NoExecute);
        assert!(Toleration::exists("", None).tolerates(&taint).unwrap());
        assert!(
            !Toleration::exists("", Some(TaintEffect::NoSchedule))
                .tolerates(&taint)
                .unwrap()
        );
    }

    #[test]
    fn effect_must_match_when_set() {
        let taint = Taint::new("foo", "bar", TaintEffect::PreferNoSchedule);
        let tol = Toleration::equal("foo", "bar", TaintEffect::NoSchedule);
        assert!(!tol.tolerates(&taint).unwrap());
    }

    #[test]
    fn unknown_operator_is_malformed() {
        let taint = Taint::new("foo", "bar", TaintEffect::PreferNoSchedule);
        let tol = Toleration {
            key: "foo".to_string(),
            operator: "Maybe".to_string(),
            value: "bar".to_string(),
            effect: String::new(),
        };
        assert!(matches!(
            tol.tolerates(&taint),
            Err(ResourceError::MalformedToleration { .. })
        ));
    }

    #[test]
    fn pod_deserializes_with_defaults() {
        let pod: Pod = serde_json::from_str(
            r#"{
                "name": "web",
                "tolerations": [
                    {"key": "foo", "operator": "Equal", "value": "bar", "effect": "PreferNoSchedule"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(pod.namespace, "default");
        assert_eq!(pod.tolerations.len(), 1);
        assert!(pod.containers.is_empty());
        assert!(pod.affinity.is_none());
    }

    #[test]
    fn affinity_uses_control_plane_field_names() {
        let affinity: Affinity = serde_json::from_str(
            r#"{
                "nodeAffinity": {
                    "preferredDuringSchedulingIgnoredDuringExecution": [
                        {"weight": 5, "preference": {"matchExpressions": [
                            {"key": "zone", "operator": "In", "values": ["a"]}
                        ]}}
                    ]
                }
            }"#,
        )
        .unwrap();
        let node_affinity = affinity.node_affinity.unwrap();
        assert_eq!(node_affinity.preferred.len(), 1);
        assert_eq!(node_affinity.preferred[0].weight, 5);
        assert!(node_affinity.required.is_empty());
    }
}
