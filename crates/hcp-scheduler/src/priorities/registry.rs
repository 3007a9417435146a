//! Name → priority function table, resolved once from the configuration.

use std::collections::BTreeMap;

use crate::config::{DEFAULT_WEIGHT, SchedulerConfig};
use crate::error::{ScoringError, ScoringResult};
use crate::priorities::PriorityKind;

/// A priority function with its configured weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredPriority {
    pub kind: PriorityKind,
    pub weight: i64,
}

#[derive(Debug, Clone)]
pub struct PriorityRegistry {
    weights: BTreeMap<PriorityKind, i64>,
    enabled: Vec<RegisteredPriority>,
}

impl PriorityRegistry {
    pub fn from_config(config: &SchedulerConfig) -> ScoringResult<Self> {
        config.validate()?;

        let mut weights = BTreeMap::new();
        let mut enabled = Vec::new();
        for priority in config.effective_priorities() {
            let kind = PriorityKind::from_name(&priority.name)
                .ok_or_else(|| ScoringError::UnknownPriority(priority.name.clone()))?;
            weights.insert(kind, priority.weight);
            enabled.push(RegisteredPriority {
                kind,
                weight: priority.weight,
            });
        }
        Ok(Self { weights, enabled })
    }

    /// Resolve `name`. Every registered function can be looked up; those not
    /// enabled by the policy carry the default weight.
    pub fn lookup(&self, name: &str) -> ScoringResult<RegisteredPriority> {
        let kind = PriorityKind::from_name(name)
            .ok_or_else(|| ScoringError::UnknownPriority(name.to_string()))?;
        Ok(RegisteredPriority {
            kind,
            weight: self.weights.get(&kind).copied().unwrap_or(DEFAULT_WEIGHT),
        })
    }

    /// The policy's enabled functions, in configuration order.
    pub fn enabled(&self) -> &[RegisteredPriority] {
        &self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriorityConfig;

    #[test]
    fn default_policy_is_taint_toleration() {
        let registry = PriorityRegistry::from_config(&SchedulerConfig::default()).unwrap();
        assert_eq!(
            registry.enabled(),
            &[RegisteredPriority {
                kind: PriorityKind::TaintToleration,
                weight: 1
            }]
        );
    }

    #[test]
    fn lookup_uses_configured_weight() {
        let config = SchedulerConfig {
            priorities: vec![
                PriorityConfig::new("NodeAffinity", 5),
                PriorityConfig::new("TaintToleration", 2),
            ],
            ..SchedulerConfig::default()
        };
        let registry = PriorityRegistry::from_config(&config).unwrap();

        assert_eq!(registry.lookup("TaintToleration").unwrap().weight, 2);
        assert_eq!(registry.lookup("LeastRequested").unwrap().weight, 1);
        assert_eq!(registry.enabled()[0].kind, PriorityKind::NodeAffinity);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let registry = PriorityRegistry::from_config(&SchedulerConfig::default()).unwrap();
        assert!(matches!(
            registry.lookup("Spread"),
            Err(ScoringError::UnknownPriority(name)) if name == "Spread"
        ));
    }
}
