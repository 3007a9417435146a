//! Scheduler policy configuration (`hcp-scheduler.toml`).

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ScoringError, ScoringResult};
use crate::priorities::PriorityKind;

pub const DEFAULT_MAX_PRIORITY: i64 = 10;
pub const DEFAULT_WEIGHT: i64 = 1;
/// Upper bound for `max_priority`.
pub const MAX_PRIORITY_CEILING: i64 = 1_000_000;
/// Upper bound for a priority weight.
pub const MAX_WEIGHT: i64 = 1_000_000;

/// How replicas of one deployment are placed within a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaStrategy {
    /// Every replica is scored against the same snapshot.
    #[default]
    Greedy,
    /// Each placed replica is bound into a private copy of the snapshot
    /// before the next one is scored.
    Spread,
}

impl fmt::Display for ReplicaStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicaStrategy::Greedy => f.write_str("greedy"),
            ReplicaStrategy::Spread => f.write_str("spread"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityConfig {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

impl PriorityConfig {
    pub fn new(name: &str, weight: i64) -> Self {
        Self {
            name: name.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound of every normalized priority score.
    #[serde(default = "default_max_priority")]
    pub max_priority: i64,
    #[serde(default)]
    pub replica_strategy: ReplicaStrategy,
    /// Enabled priority functions. Empty means `TaintToleration` alone.
    #[serde(default)]
    pub priorities: Vec<PriorityConfig>,
}

fn default_max_priority() -> i64 {
    DEFAULT_MAX_PRIORITY
}

fn default_weight() -> i64 {
    DEFAULT_WEIGHT
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_priority: DEFAULT_MAX_PRIORITY,
            replica_strategy: ReplicaStrategy::default(),
            priorities: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> ScoringResult<Self> {
        let config: SchedulerConfig =
            toml::from_str(content).map_err(|e| ScoringError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ScoringResult<()> {
        if !(1..=MAX_PRIORITY_CEILING).contains(&self.max_priority) {
            return Err(ScoringError::Config(format!(
                "max_priority must be in 1..={MAX_PRIORITY_CEILING}, got {}",
                self.max_priority
            )));
        }

        let mut seen = BTreeSet::new();
        for priority in &self.priorities {
            if PriorityKind::from_name(&priority.name).is_none() {
                return Err(ScoringError::UnknownPriority(priority.name.clone()));
            }
            if !(1..=MAX_WEIGHT).contains(&priority.weight) {
                return Err(ScoringError::Config(format!(
                    "priority {} has weight {} outside 1..={MAX_WEIGHT}",
                    priority.name, priority.weight
                )));
            }
            if !seen.insert(priority.name.as_str()) {
                return Err(ScoringError::Config(format!(
                    "priority {} is listed twice",
                    priority.name
                )));
            }
        }
        Ok(())
    }

    /// The priorities a policy-wide scoring call runs.
    pub fn effective_priorities(&self) -> Vec<PriorityConfig> {
        if self.priorities.is_empty() {
            vec![PriorityConfig::new(PriorityKind::TaintToleration.name(), DEFAULT_WEIGHT)]
        } else {
            self.priorities.clone()
        }
    }
}
