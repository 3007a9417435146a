//! Numeric resource vectors and their display form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ResourceResult;
use crate::quantity::{format_bytes, format_cpu, parse_milli_quantity, parse_quantity};
use crate::types::QuantityMap;

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";
pub const RESOURCE_EPHEMERAL_STORAGE: &str = "ephemeral-storage";
pub const RESOURCE_PODS: &str = "pods";

/// A collection of compute resources.
///
/// All fields are non-negative. Only aggregation routines (summing the pods
/// bound to a node, the nodes of a cluster) write to a `Resource`; scoring
/// reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub milli_cpu: i64,
    /// Bytes.
    pub memory: i64,
    /// Bytes.
    pub ephemeral_storage: i64,
    pub allowed_pod_number: i64,
    /// Extended resources (`nvidia.com/gpu`, `hugepages-2Mi`, ...).
    pub scalar_resources: BTreeMap<String, i64>,
}

impl Resource {
    /// Build from a quantity map such as a container's requests or a node's
    /// allocatable. Unknown names are kept as scalar resources.
    pub fn from_quantities(quantities: &QuantityMap) -> ResourceResult<Self> {
        let mut resource = Resource::default();
        for (name, quantity) in quantities {
            match name.as_str() {
                RESOURCE_CPU => resource.milli_cpu = parse_milli_quantity(quantity)?,
                RESOURCE_MEMORY => resource.memory = parse_quantity(quantity)?,
                RESOURCE_EPHEMERAL_STORAGE => {
                    resource.ephemeral_storage = parse_quantity(quantity)?
                }
                RESOURCE_PODS => resource.allowed_pod_number = parse_quantity(quantity)?,
                _ => {
                    resource
                        .scalar_resources
                        .insert(name.clone(), parse_quantity(quantity)?);
                }
            }
        }
        Ok(resource)
    }

    /// Accumulate `other` into `self`. Sums saturate instead of overflowing.
    pub fn add(&mut self, other: &Resource) {
        self.milli_cpu = self.milli_cpu.saturating_add(other.milli_cpu);
        self.memory = self.memory.saturating_add(other.memory);
        self.ephemeral_storage = self.ephemeral_storage.saturating_add(other.ephemeral_storage);
        self.allowed_pod_number = self
            .allowed_pod_number
            .saturating_add(other.allowed_pod_number);
        for (name, value) in &other.scalar_resources {
            let entry = self.scalar_resources.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_add(*value);
        }
    }

    /// Raise every dimension of `self` to at least `other`'s.
    pub fn set_max(&mut self, other: &Resource) {
        self.milli_cpu = self.milli_cpu.max(other.milli_cpu);
        self.memory = self.memory.max(other.memory);
        self.ephemeral_storage = self.ephemeral_storage.max(other.ephemeral_storage);
        self.allowed_pod_number = self.allowed_pod_number.max(other.allowed_pod_number);
        for (name, value) in &other.scalar_resources {
            let entry = self.scalar_resources.entry(name.clone()).or_insert(0);
            *entry = (*entry).max(*value);
        }
    }

    /// Whether any dimension of `self` exceeds `limit`.
    pub fn exceeds(&self, limit: &Resource) -> bool {
        self.milli_cpu > limit.milli_cpu
            || self.memory > limit.memory
            || self.ephemeral_storage > limit.ephemeral_storage
            || self.scalar_resources.iter().any(|(name, value)| {
                *value > limit.scalar_resources.get(name).copied().unwrap_or(0)
            })
    }

    pub fn scalar(&self, name: &str) -> i64 {
        self.scalar_resources.get(name).copied().unwrap_or(0)
    }
}

/// Display form of a resource vector, for reporting only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: String,
    pub memory: String,
    pub fs: String,
    pub network: String,
}

impl From<&Resource> for Resources {
    fn from(resource: &Resource) -> Self {
        Self {
            cpu: format_cpu(resource.milli_cpu),
            memory: format_bytes(resource.memory),
            fs: format_bytes(resource.ephemeral_storage),
            network: String::new(),
        }
    }
}
