//! Execution graph builder.
//!
//! Converts a definition's flat step list into per-run bookkeeping: one
//! mutable `ExecutionNode` per step, a linear successor map, and the state
//! blackboard seeded from `initial_state` overlaid with caller input. The
//! graph lives for exactly one run and is discarded afterwards.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use windlass_types::workflow::{WorkflowDefinition, WorkflowStep};

/// Lifecycle of one node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Per-run mutable record for one step.
#[derive(Debug, Clone)]
pub struct ExecutionNode {
    pub step_id: String,
    /// The immutable step this node tracks.
    pub step: WorkflowStep,
    pub status: NodeStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Retry attempts made for this node, summed into run metrics.
    pub retries: u32,
}

/// Per-run aggregate: nodes, successor edges, pointer, and the blackboard.
#[derive(Debug)]
pub struct ExecutionGraph {
    pub nodes: HashMap<String, ExecutionNode>,
    /// stepId -> successor stepIds. Linear by construction; condition steps
    /// override the lookup at drive time.
    pub edges: HashMap<String, Vec<String>>,
    pub current_step_id: Option<String>,
    /// The state blackboard. Monotonically additive on success.
    pub state: HashMap<String, Value>,
}

/// Build the execution graph for one run. Pure construction, no side effects.
pub fn build_graph(
    definition: &WorkflowDefinition,
    caller_input: &HashMap<String, Value>,
) -> ExecutionGraph {
    let mut nodes = HashMap::with_capacity(definition.steps.len());
    let mut edges = HashMap::with_capacity(definition.steps.len());

    for (index, step) in definition.steps.iter().enumerate() {
        nodes.insert(
            step.id.clone(),
            ExecutionNode {
                step_id: step.id.clone(),
                step: step.clone(),
                status: NodeStatus::Pending,
                result: None,
                error: None,
                started_at: None,
                completed_at: None,
                retries: 0,
            },
        );

        let successors = match definition.steps.get(index + 1) {
            Some(next) => vec![next.id.clone()],
            None => Vec::new(),
        };
        edges.insert(step.id.clone(), successors);
    }

    // Caller input wins over template defaults.
    let mut state = definition.initial_state.clone().unwrap_or_default();
    state.extend(caller_input.clone());

    ExecutionGraph {
        nodes,
        edges,
        current_step_id: Some(definition.start_step_id.clone()),
        state,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
