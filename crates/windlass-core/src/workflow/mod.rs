//! Workflow engine core: definition validation, graph building, and driving.
//!
//! This module contains the "brain" of the workflow engine:
//! - `definition` -- YAML/JSON parsing and structural validation
//! - `registry` -- shared workflow/agent registries
//! - `graph` -- execution graph builder (nodes, edges, state blackboard)
//! - `state` -- dotted-path resolution and template interpolation
//! - `condition` -- field/operator/value condition evaluation
//! - `interpreter` -- step type dispatch for all 13 step kinds
//! - `retry` -- backoff scheduling shared by the driver and the agent planner
//! - `breaker` -- per-step circuit breaker state machine
//! - `driver` -- the step loop applying per-step error policy
//! - `metrics` -- terminal metrics aggregation

pub mod breaker;
pub mod condition;
pub mod definition;
pub mod driver;
pub mod graph;
pub mod interpreter;
pub mod metrics;
pub mod registry;
pub mod retry;
pub mod state;
