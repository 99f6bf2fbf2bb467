//! Workflow driver: the per-run state machine.
//!
//! `WorkflowDriver::execute` looks a definition up, builds the execution
//! graph, and walks the step pointer until no successor remains. Each attempt
//! passes the step's circuit breaker gate and runs under the step's timeout;
//! failures are resolved by the step's `on_error` policy (fail, skip, retry
//! with backoff, fallback routing). The run always produces a structured
//! result with metrics; only definition-level problems surface as `Err`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use windlass_types::workflow::{
    ExecutionErrorInfo, ExecutionStatus, OnErrorPolicy, RetryConfig, StepConfig,
    WorkflowDefinition, WorkflowExecutionContext, WorkflowExecutionResult, WorkflowStep,
};

use crate::agent::planner::AgentPlanner;

use super::breaker::CircuitBreaker;
use super::graph::{build_graph, ExecutionGraph, NodeStatus};
use super::interpreter::{HttpTransport, ReqwestTransport, StepError, StepInterpreter};
use super::metrics::compute_metrics;
use super::registry::WorkflowRegistry;
use super::retry::BackoffSchedule;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Definition-level failures. Fatal and immediate; runtime step failures are
/// reported inside the execution result instead.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No workflow registered under this id.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    /// The workflow is registered but disabled.
    #[error("workflow '{name}' is disabled")]
    WorkflowDisabled { name: String },
}

// ---------------------------------------------------------------------------
// WorkflowDriver
// ---------------------------------------------------------------------------

/// Drives workflow runs. Shared across runs via `Arc`; each run owns its own
/// graph and interpreter.
pub struct WorkflowDriver {
    workflows: Arc<WorkflowRegistry>,
    planner: Arc<AgentPlanner>,
    http: Arc<dyn HttpTransport>,
    /// One breaker per `workflow_id:step_id`. Outlives individual runs so
    /// consecutive failures accumulate across them.
    breakers: DashMap<String, CircuitBreaker>,
    live: DashMap<Uuid, ExecutionStatus>,
}

impl WorkflowDriver {
    /// Driver with the default reqwest transport.
    pub fn new(workflows: Arc<WorkflowRegistry>, planner: Arc<AgentPlanner>) -> Self {
        Self::with_transport(workflows, planner, Arc::new(ReqwestTransport::new()))
    }

    /// Driver with a custom HTTP transport.
    pub fn with_transport(
        workflows: Arc<WorkflowRegistry>,
        planner: Arc<AgentPlanner>,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            workflows,
            planner,
            http,
            breakers: DashMap::new(),
            live: DashMap::new(),
        }
    }

    /// Execution ids currently in flight.
    pub fn running_executions(&self) -> Vec<Uuid> {
        self.live.iter().map(|entry| *entry.key()).collect()
    }

    /// Run a workflow to completion.
    ///
    /// Unknown or disabled workflows are `Err`; anything that goes wrong
    /// during the run is reported in the result with status `failed` and
    /// code `EXECUTION_ERROR`, with state preserved for diagnostics.
    pub async fn execute(
        &self,
        context: &WorkflowExecutionContext,
    ) -> Result<WorkflowExecutionResult, DriverError> {
        let definition = self
            .workflows
            .get(&context.workflow_id)
            .ok_or(DriverError::WorkflowNotFound(context.workflow_id))?;
        if !definition.enabled {
            return Err(DriverError::WorkflowDisabled {
                name: definition.name,
            });
        }

        let execution_id = Uuid::now_v7();
        let started_at = Utc::now();
        let start = Instant::now();
        self.live.insert(execution_id, ExecutionStatus::Running);
        tracing::info!(
            execution_id = %execution_id,
            workflow_id = %definition.id,
            workflow = definition.name.as_str(),
            "workflow execution started"
        );

        let mut graph = build_graph(&definition, &context.input);
        let interpreter = StepInterpreter::new(
            &definition,
            Arc::clone(&self.http),
            Arc::clone(&self.planner),
            context.user_id,
        );

        let outcome = self.run_loop(&definition, &interpreter, &mut graph).await;

        self.live.remove(&execution_id);
        let metrics = compute_metrics(&graph, start.elapsed());

        match outcome {
            Ok(()) => {
                tracing::info!(
                    execution_id = %execution_id,
                    steps = metrics.steps_executed,
                    "workflow execution completed"
                );
                Ok(WorkflowExecutionResult {
                    execution_id,
                    workflow_id: definition.id,
                    status: ExecutionStatus::Completed,
                    output: Some(graph.state.clone()),
                    error: None,
                    metrics: Some(metrics),
                    state: Some(graph.state),
                    started_at,
                    completed_at: Some(Utc::now()),
                })
            }
            Err((step_id, message)) => {
                tracing::warn!(
                    execution_id = %execution_id,
                    step_id = step_id.as_str(),
                    error = message.as_str(),
                    "workflow execution failed"
                );
                Ok(WorkflowExecutionResult {
                    execution_id,
                    workflow_id: definition.id,
                    status: ExecutionStatus::Failed,
                    output: None,
                    error: Some(ExecutionErrorInfo {
                        step_id: Some(step_id),
                        message,
                        code: Some("EXECUTION_ERROR".to_string()),
                        details: None,
                    }),
                    metrics: Some(metrics),
                    state: Some(graph.state),
                    started_at,
                    completed_at: Some(Utc::now()),
                })
            }
        }
    }

    /// Walk the step pointer until it clears. `Err` carries the failing step
    /// id and message.
    async fn run_loop(
        &self,
        definition: &WorkflowDefinition,
        interpreter: &StepInterpreter,
        graph: &mut ExecutionGraph,
    ) -> Result<(), (String, String)> {
        while let Some(step_id) = graph.current_step_id.take() {
            let Some(node) = graph.nodes.get_mut(&step_id) else {
                return Err((step_id.clone(), format!("unknown step '{step_id}'")));
            };
            node.status = NodeStatus::Running;
            node.started_at = Some(Utc::now());
            let step = node.step.clone();

            let first = self
                .attempt_step(definition, interpreter, &step, &graph.state)
                .await;
            let outcome = match first {
                Err(error) if step.on_error == OnErrorPolicy::Retry => {
                    match effective_retry(&step, definition) {
                        Some(policy) => self
                            .retry_step(definition, interpreter, &step, graph, policy)
                            .await
                            .ok_or(error),
                        None => Err(error),
                    }
                }
                other => other,
            };

            match outcome {
                Ok(result) => {
                    let next = next_step_id(&step, graph, Some(&result));
                    complete_node(graph, &step_id, result);
                    graph.current_step_id = next;
                }
                Err(error) => {
                    let message = error.to_string();
                    match step.on_error {
                        OnErrorPolicy::Skip => {
                            tracing::debug!(
                                step_id = step_id.as_str(),
                                error = message.as_str(),
                                "step failed, skipping"
                            );
                            let next = next_step_id(&step, graph, None);
                            skip_node(graph, &step_id, &message);
                            graph.current_step_id = next;
                        }
                        OnErrorPolicy::Retry | OnErrorPolicy::Fallback => {
                            fail_node(graph, &step_id, &message);
                            match &step.fallback_step_id {
                                Some(fallback) => {
                                    tracing::debug!(
                                        step_id = step_id.as_str(),
                                        fallback = fallback.as_str(),
                                        "routing to fallback step"
                                    );
                                    graph.current_step_id = Some(fallback.clone());
                                }
                                None => return Err((step_id, message)),
                            }
                        }
                        OnErrorPolicy::Fail => {
                            fail_node(graph, &step_id, &message);
                            return Err((step_id, message));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-attempt a failed step under its retry policy. `None` on exhaustion.
    async fn retry_step(
        &self,
        definition: &WorkflowDefinition,
        interpreter: &StepInterpreter,
        step: &WorkflowStep,
        graph: &mut ExecutionGraph,
        policy: &RetryConfig,
    ) -> Option<Value> {
        let mut schedule = BackoffSchedule::new(policy);
        for attempt in 1..=policy.max_attempts {
            tokio::time::sleep(schedule.next_delay()).await;
            if let Some(node) = graph.nodes.get_mut(step.id.as_str()) {
                node.retries += 1;
            }
            tracing::debug!(
                step_id = step.id.as_str(),
                attempt,
                max_attempts = policy.max_attempts,
                "retrying step"
            );
            if let Ok(result) = self
                .attempt_step(definition, interpreter, step, &graph.state)
                .await
            {
                return Some(result);
            }
        }
        tracing::warn!(step_id = step.id.as_str(), "step retries exhausted");
        None
    }

    /// One attempt: breaker gate, then the handler under the step timeout,
    /// then the breaker recording.
    async fn attempt_step(
        &self,
        definition: &WorkflowDefinition,
        interpreter: &StepInterpreter,
        step: &WorkflowStep,
        state: &HashMap<String, Value>,
    ) -> Result<Value, StepError> {
        let breaker_key = match &step.circuit_breaker {
            Some(config) if config.enabled => {
                let key = format!("{}:{}", definition.id, step.id);
                let admitted = self
                    .breakers
                    .entry(key.clone())
                    .or_insert_with(|| CircuitBreaker::new(config.clone()))
                    .try_acquire();
                if !admitted {
                    tracing::warn!(step_id = step.id.as_str(), "circuit open, refusing attempt");
                    return Err(StepError::CircuitOpen);
                }
                Some(key)
            }
            _ => None,
        };

        let result = match step.timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    interpreter.execute(step, state),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(StepError::Timeout),
                }
            }
            None => interpreter.execute(step, state).await,
        };

        if let Some(key) = breaker_key {
            if let Some(mut breaker) = self.breakers.get_mut(&key) {
                match &result {
                    Ok(_) => breaker.record_success(),
                    Err(_) => breaker.record_failure(),
                }
            }
        }
        result
    }
}

/// Step-level retry config, falling back to the workflow's `global_retry`.
/// Disabled configs yield `None`.
fn effective_retry<'a>(
    step: &'a WorkflowStep,
    definition: &'a WorkflowDefinition,
) -> Option<&'a RetryConfig> {
    step.retry
        .as_ref()
        .or(definition.global_retry.as_ref())
        .filter(|policy| policy.enabled)
}

/// Condition steps route on their boolean result; everything else follows
/// its single linear edge. `None` ends the run.
fn next_step_id(
    step: &WorkflowStep,
    graph: &ExecutionGraph,
    result: Option<&Value>,
) -> Option<String> {
    if let StepConfig::Condition {
        then_steps,
        else_steps,
        ..
    } = &step.config
    {
        let branch = if result.and_then(Value::as_bool).unwrap_or(false) {
            then_steps
        } else {
            else_steps
        };
        return branch.first().cloned();
    }
    graph
        .edges
        .get(&step.id)
        .and_then(|successors| successors.first())
        .cloned()
}

fn complete_node(graph: &mut ExecutionGraph, step_id: &str, result: Value) {
    if let Some(node) = graph.nodes.get_mut(step_id) {
        node.status = NodeStatus::Completed;
        node.result = Some(result.clone());
        node.completed_at = Some(Utc::now());
    }
    graph.state.insert(step_id.to_string(), result);
}

fn fail_node(graph: &mut ExecutionGraph, step_id: &str, message: &str) {
    if let Some(node) = graph.nodes.get_mut(step_id) {
        node.status = NodeStatus::Failed;
        node.error = Some(message.to_string());
        node.completed_at = Some(Utc::now());
    }
}

/// Skipped nodes leave state untouched.
fn skip_node(graph: &mut ExecutionGraph, step_id: &str, message: &str) {
    if let Some(node) = graph.nodes.get_mut(step_id) {
        node.status = NodeStatus::Skipped;
        node.error = Some(message.to_string());
        node.completed_at = Some(Utc::now());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
