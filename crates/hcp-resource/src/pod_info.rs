//! Pod aggregate: a pod descriptor plus pre-computed placement facts.

use std::sync::Arc;

use tracing::warn;

use crate::affinity::{AffinityTerm, WeightedAffinityTerm};
use crate::error::{ResourceError, ResourceResult};
use crate::resource::{Resource, Resources};
use crate::types::{PodAffinity, Pod};

/// A pod with pre-computed information to accelerate scoring.
///
/// Built once per pod per scheduling attempt and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PodInfo {
    /// Empty for a pod that is not bound yet.
    pub cluster_name: String,
    /// Empty for a pod that is not bound yet.
    pub node_name: String,
    pub pod_name: String,

    pub pod: Arc<Pod>,

    pub requested_resources: Resource,
    /// The owning cluster's allocable figures, for context.
    pub allocable_resources: Option<Resources>,
    /// The owning cluster's capacity figures, for context.
    pub capacity_resources: Option<Resources>,

    pub required_affinity_terms: Vec<AffinityTerm>,
    pub required_anti_affinity_terms: Vec<AffinityTerm>,
    pub preferred_affinity_terms: Vec<WeightedAffinityTerm>,
    pub preferred_anti_affinity_terms: Vec<WeightedAffinityTerm>,
    /// Set when the affinity rules could not be parsed; all term lists are
    /// then empty and the pod counts as having no affinity preferences.
    pub parse_error: Option<ResourceError>,
}

#[derive(Default)]
struct ParsedTerms {
    required_affinity: Vec<AffinityTerm>,
    required_anti_affinity: Vec<AffinityTerm>,
    preferred_affinity: Vec<WeightedAffinityTerm>,
    preferred_anti_affinity: Vec<WeightedAffinityTerm>,
}

impl PodInfo {
    /// Build the aggregate for an unbound pod.
    ///
    /// Affinity parse failures are recorded in `parse_error`; malformed
    /// resource requests are returned as errors.
    pub fn new(pod: Arc<Pod>) -> ResourceResult<Self> {
        let requested_resources = pod_requests(&pod)?;

        let (terms, parse_error) = match parse_terms(&pod) {
            Ok(terms) => (terms, None),
            Err(e) => {
                warn!(pod = %pod.name, error = %e, "ignoring unparsable affinity rules");
                (ParsedTerms::default(), Some(e))
            }
        };

        Ok(Self {
            cluster_name: String::new(),
            node_name: pod.node_name.clone().unwrap_or_default(),
            pod_name: pod.name.clone(),
            requested_resources,
            allocable_resources: None,
            capacity_resources: None,
            required_affinity_terms: terms.required_affinity,
            required_anti_affinity_terms: terms.required_anti_affinity,
            preferred_affinity_terms: terms.preferred_affinity,
            preferred_anti_affinity_terms: terms.preferred_anti_affinity,
            parse_error,
            pod,
        })
    }

    /// Attach the owning cluster's resource figures.
    pub fn with_cluster_context(mut self, allocable: Resources, capacity: Resources) -> Self {
        self.allocable_resources = Some(allocable);
        self.capacity_resources = Some(capacity);
        self
    }

    /// A copy of this pod bound to `node_name` in `cluster_name` under a new
    /// name. Used to simulate a replica placement.
    pub fn bound_to(&self, cluster_name: &str, node_name: &str, pod_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            node_name: node_name.to_string(),
            pod_name: pod_name.to_string(),
            ..self.clone()
        }
    }

    pub fn has_affinity(&self) -> bool {
        !self.required_affinity_terms.is_empty()
            || !self.required_anti_affinity_terms.is_empty()
            || !self.preferred_affinity_terms.is_empty()
            || !self.preferred_anti_affinity_terms.is_empty()
    }

    pub fn has_required_anti_affinity(&self) -> bool {
        !self.required_anti_affinity_terms.is_empty()
    }
}

/// Effective request: the larger of the containers' sum and each init
/// container, per dimension.
fn pod_requests(pod: &Pod) -> ResourceResult<Resource> {
    let mut total = Resource::default();
    for container in &pod.containers {
        total.add(&Resource::from_quantities(&container.requests)?);
    }
    for init in &pod.init_containers {
        total.set_max(&Resource::from_quantities(&init.requests)?);
    }
    Ok(total)
}

fn parse_terms(pod: &Pod) -> ResourceResult<ParsedTerms> {
    let Some(affinity) = &pod.affinity else {
        return Ok(ParsedTerms::default());
    };
    let ns = pod.namespace.as_str();

    let (required_affinity, preferred_affinity) = parse_pod_affinity(affinity.pod_affinity.as_ref(), ns)?;
    let (required_anti_affinity, preferred_anti_affinity) =
        parse_pod_affinity(affinity.pod_anti_affinity.as_ref(), ns)?;

    Ok(ParsedTerms {
        required_affinity,
        required_anti_affinity,
        preferred_affinity,
        preferred_anti_affinity,
    })
}

fn parse_pod_affinity(
    rules: Option<&PodAffinity>,
    namespace: &str,
) -> ResourceResult<(Vec<AffinityTerm>, Vec<WeightedAffinityTerm>)> {
    let Some(rules) = rules else {
        return Ok((Vec::new(), Vec::new()));
    };
    let required = rules
        .required
        .iter()
        .map(|term| AffinityTerm::new(term, namespace))
        .collect::<ResourceResult<Vec<_>>>()?;
    let preferred = rules
        .preferred
        .iter()
        .map(|w| WeightedAffinityTerm::new(&w.pod_affinity_term, w.weight, namespace))
        .collect::<ResourceResult<Vec<_>>>()?;
    Ok((required, preferred))
}
