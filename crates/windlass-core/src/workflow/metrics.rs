//! Terminal metrics aggregation.

use std::time::Duration;

use windlass_types::workflow::ExecutionMetrics;

use super::graph::{ExecutionGraph, NodeStatus};

/// Fold node statuses into the run's metrics.
///
/// `steps_executed` counts every node that left `pending` (including skipped
/// nodes); succeeded/failed count terminal statuses; `retries` sums the
/// per-node retry counters.
pub fn compute_metrics(graph: &ExecutionGraph, duration: Duration) -> ExecutionMetrics {
    let mut steps_executed = 0;
    let mut steps_succeeded = 0;
    let mut steps_failed = 0;
    let mut retries = 0;

    for node in graph.nodes.values() {
        if node.status != NodeStatus::Pending {
            steps_executed += 1;
        }
        match node.status {
            NodeStatus::Completed => steps_succeeded += 1,
            NodeStatus::Failed => steps_failed += 1,
            _ => {}
        }
        retries += node.retries;
    }

    ExecutionMetrics {
        duration_ms: duration.as_millis() as u64,
        steps_executed,
        steps_succeeded,
        steps_failed,
        retries,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
