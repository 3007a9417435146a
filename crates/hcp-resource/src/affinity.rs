//! Compiled label selectors and pod affinity terms.
//!
//! Selectors are compiled once from their descriptor form; a compiled
//! [`Selector`] is always valid, so matching cannot fail.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{ResourceError, ResourceResult};
use crate::types::{Labels, LabelSelector, NodeSelectorTerm, Pod, PodAffinityTerm, SelectorRequirement};

/// Highest weight a preferred term may carry.
pub const MAX_TERM_WEIGHT: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    /// Numeric comparison; node selectors only.
    Gt,
    /// Numeric comparison; node selectors only.
    Lt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub key: String,
    pub operator: SelectorOperator,
    pub values: BTreeSet<String>,
}

impl Requirement {
    fn compile(raw: &SelectorRequirement, allow_numeric: bool) -> ResourceResult<Self> {
        let operator = match raw.operator.as_str() {
            "In" => SelectorOperator::In,
            "NotIn" => SelectorOperator::NotIn,
            "Exists" => SelectorOperator::Exists,
            "DoesNotExist" => SelectorOperator::DoesNotExist,
            "Gt" if allow_numeric => SelectorOperator::Gt,
            "Lt" if allow_numeric => SelectorOperator::Lt,
            other => {
                return Err(ResourceError::InvalidSelector(format!(
                    "{}: unsupported operator {other:?}",
                    raw.key
                )));
            }
        };

        let arity_ok = match operator {
            SelectorOperator::In | SelectorOperator::NotIn => !raw.values.is_empty(),
            SelectorOperator::Exists | SelectorOperator::DoesNotExist => raw.values.is_empty(),
            SelectorOperator::Gt | SelectorOperator::Lt => {
                raw.values.len() == 1 && raw.values[0].parse::<i64>().is_ok()
            }
        };
        if !arity_ok {
            return Err(ResourceError::InvalidSelector(format!(
                "{}: wrong values for operator {operator:?}",
                raw.key
            )));
        }

        Ok(Self {
            key: raw.key.clone(),
            operator,
            values: raw.values.iter().cloned().collect(),
        })
    }

    fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.contains(v)),
            SelectorOperator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
            SelectorOperator::Gt | SelectorOperator::Lt => {
                let (Some(value), Some(bound)) = (value, self.values.first()) else {
                    return false;
                };
                match (value.parse::<i64>(), bound.parse::<i64>()) {
                    (Ok(v), Ok(b)) if self.operator == SelectorOperator::Gt => v > b,
                    (Ok(v), Ok(b)) => v < b,
                    _ => false,
                }
            }
        }
    }
}

/// A compiled label query. Requirements are ANDed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selector {
    requirements: Vec<Requirement>,
    /// Set for an absent selector, which selects no objects.
    match_nothing: bool,
}

impl Selector {
    /// Selects every label set.
    pub fn everything() -> Self {
        Self {
            requirements: Vec::new(),
            match_nothing: false,
        }
    }

    /// Selects no label set.
    pub fn nothing() -> Self {
        Self {
            requirements: Vec::new(),
            match_nothing: true,
        }
    }

    pub fn from_label_selector(selector: &LabelSelector) -> ResourceResult<Self> {
        let mut requirements: Vec<Requirement> = selector
            .match_labels
            .iter()
            .map(|(key, value)| Requirement {
                key: key.clone(),
                operator: SelectorOperator::In,
                values: BTreeSet::from([value.clone()]),
            })
            .collect();
        for raw in &selector.match_expressions {
            requirements.push(Requirement::compile(raw, false)?);
        }
        Ok(Self {
            requirements,
            match_nothing: false,
        })
    }

    /// Compile a node selector term. A term without requirements matches
    /// no node.
    pub fn from_node_selector_term(term: &NodeSelectorTerm) -> ResourceResult<Self> {
        if term.match_expressions.is_empty() {
            return Ok(Self::nothing());
        }
        let requirements = term
            .match_expressions
            .iter()
            .map(|raw| Requirement::compile(raw, true))
            .collect::<ResourceResult<Vec<_>>>()?;
        Ok(Self {
            requirements,
            match_nothing: false,
        })
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        !self.match_nothing && self.requirements.iter().all(|r| r.matches(labels))
    }
}

/// A processed pod affinity term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffinityTerm {
    pub namespaces: BTreeSet<String>,
    pub selector: Selector,
    pub topology_key: String,
    pub namespace_selector: Option<Selector>,
}

impl AffinityTerm {
    /// Compile `term` for a pod living in `owner_namespace`. A term naming
    /// neither namespaces nor a namespace selector applies to the owner's
    /// namespace.
    pub fn new(term: &PodAffinityTerm, owner_namespace: &str) -> ResourceResult<Self> {
        let selector = match &term.label_selector {
            Some(selector) => Selector::from_label_selector(selector)?,
            None => Selector::nothing(),
        };
        let namespace_selector = term
            .namespace_selector
            .as_ref()
            .map(Selector::from_label_selector)
            .transpose()?;

        let mut namespaces: BTreeSet<String> = term.namespaces.iter().cloned().collect();
        if namespaces.is_empty() && namespace_selector.is_none() {
            namespaces.insert(owner_namespace.to_string());
        }

        Ok(Self {
            namespaces,
            selector,
            topology_key: term.topology_key.clone(),
            namespace_selector,
        })
    }

    /// Whether `pod` is selected by this term. `namespace_labels` are the
    /// labels of the pod's namespace, when known.
    pub fn matches(&self, pod: &Pod, namespace_labels: Option<&Labels>) -> bool {
        let namespace_ok = self.namespaces.contains(&pod.namespace)
            || self.namespace_selector.as_ref().is_some_and(|selector| {
                let empty = Labels::new();
                selector.matches(namespace_labels.unwrap_or(&empty))
            });
        namespace_ok && self.selector.matches(&pod.labels)
    }
}

/// A processed preferred (soft) affinity term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedAffinityTerm {
    pub term: AffinityTerm,
    pub weight: i32,
}

impl WeightedAffinityTerm {
    pub fn new(term: &PodAffinityTerm, weight: i32, owner_namespace: &str) -> ResourceResult<Self> {
        if !(1..=MAX_TERM_WEIGHT).contains(&weight) {
            return Err(ResourceError::InvalidSelector(format!(
                "weight {weight} outside 1..={MAX_TERM_WEIGHT}"
            )));
        }
        Ok(Self {
            term: AffinityTerm::new(term, owner_namespace)?,
            weight,
        })
    }
}
