//! Resource-based priorities over CPU and memory.
//!
//! All three score the node as it would look with the incoming pod bound.
//! A pod that requests no CPU or memory is counted with a small default
//! request so that empty pods still spread.

use hcp_resource::{NodeInfo, PodInfo};

/// Millicores assumed for a pod that requests no CPU.
pub const DEFAULT_MILLI_CPU_REQUEST: i64 = 100;
/// Bytes assumed for a pod that requests no memory.
pub const DEFAULT_MEMORY_REQUEST: i64 = 200 * 1024 * 1024;

struct Usage {
    requested: i64,
    allocatable: i64,
}

impl Usage {
    fn overcommitted(&self) -> bool {
        self.requested > self.allocatable
    }

    fn fraction(&self) -> f64 {
        self.requested as f64 / self.allocatable as f64
    }
}

/// CPU and memory usage after binding `pod`. `None` when the node has no
/// allocatable CPU or memory.
fn usage_with(pod: &PodInfo, node: &NodeInfo) -> Option<(Usage, Usage)> {
    let allocatable = &node.allocatable_resources;
    if allocatable.milli_cpu <= 0 || allocatable.memory <= 0 {
        return None;
    }

    let pod_cpu = match pod.requested_resources.milli_cpu {
        0 => DEFAULT_MILLI_CPU_REQUEST,
        v => v,
    };
    let pod_memory = match pod.requested_resources.memory {
        0 => DEFAULT_MEMORY_REQUEST,
        v => v,
    };

    Some((
        Usage {
            requested: node.requested_resources.milli_cpu.saturating_add(pod_cpu),
            allocatable: allocatable.milli_cpu,
        },
        Usage {
            requested: node.requested_resources.memory.saturating_add(pod_memory),
            allocatable: allocatable.memory,
        },
    ))
}

fn ratio(part: i64, whole: i64, max_priority: i64) -> i64 {
    (i128::from(part) * i128::from(max_priority) / i128::from(whole)) as i64
}

/// Favors nodes with the most free capacity left.
pub fn least_requested(pod: &PodInfo, node: &NodeInfo, max_priority: i64) -> i64 {
    let Some((cpu, memory)) = usage_with(pod, node) else {
        return 0;
    };
    let free = |u: &Usage| {
        if u.overcommitted() {
            0
        } else {
            ratio(u.allocatable - u.requested, u.allocatable, max_priority)
        }
    };
    free(&cpu).saturating_add(free(&memory)) / 2
}

/// Favors the fullest nodes that can still take the pod.
pub fn most_requested(pod: &PodInfo, node: &NodeInfo, max_priority: i64) -> i64 {
    let Some((cpu, memory)) = usage_with(pod, node) else {
        return 0;
    };
    let used = |u: &Usage| {
        if u.overcommitted() {
            0
        } else {
            ratio(u.requested, u.allocatable, max_priority)
        }
    };
    used(&cpu).saturating_add(used(&memory)) / 2
}

/// Favors nodes whose CPU and memory utilization stay close to each other.
pub fn balanced_allocation(pod: &PodInfo, node: &NodeInfo, max_priority: i64) -> i64 {
    let Some((cpu, memory)) = usage_with(pod, node) else {
        return 0;
    };
    let (cpu_fraction, memory_fraction) = (cpu.fraction(), memory.fraction());
    if cpu_fraction >= 1.0 || memory_fraction >= 1.0 {
        return 0;
    }
    let diff = (cpu_fraction - memory_fraction).abs();
    ((1.0 - diff) * max_priority as f64) as i64
}
