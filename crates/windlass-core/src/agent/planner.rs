//! Agent planner: drives a flat tool plan to completion.
//!
//! The planner is the workflow driver's sibling orchestrator. It walks an
//! agent's `tools[]` under the agent's planning style: `sequential` runs
//! tools in order with per-tool retry, `parallel` launches all tools
//! concurrently and merges only the fulfilled results. The remaining styles
//! (`hierarchical`, `reactive`, `hybrid`) are explicit not-implemented
//! branches, never silent degradations to sequential.
//!
//! Tool invocation sits behind the object-safe `ToolRunner` trait; the
//! default runner echoes its input, real tools are a collaborator concern.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::task::JoinSet;
use uuid::Uuid;

use windlass_types::agent::{
    AgentDefinition, AgentExecutionContext, AgentExecutionResult, AgentMetrics, PlanningStyle,
    ToolSpec,
};
use windlass_types::workflow::{ExecutionErrorInfo, ExecutionStatus, RetryConfig};

use crate::workflow::registry::AgentRegistry;
use crate::workflow::retry::BackoffSchedule;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the agent planner.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// No agent registered under this id.
    #[error("agent not found: {0}")]
    AgentNotFound(Uuid),

    /// The agent is registered but disabled.
    #[error("agent '{name}' is disabled")]
    AgentDisabled { name: String },

    /// The planning style has no implementation.
    #[error("planning style {style:?} is not implemented")]
    PlanningStyleUnsupported { style: PlanningStyle },

    /// A tool failed after exhausting its retry budget.
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },
}

// ---------------------------------------------------------------------------
// ToolRunner seam
// ---------------------------------------------------------------------------

/// Object-safe tool invocation seam with boxed futures.
pub trait ToolRunner: Send + Sync {
    fn run_tool<'a>(
        &'a self,
        tool: &'a ToolSpec,
        input: &'a HashMap<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, PlannerError>> + Send + 'a>>;
}

/// Default runner: echoes the invocation without performing real work.
pub struct EchoToolRunner;

impl ToolRunner for EchoToolRunner {
    fn run_tool<'a>(
        &'a self,
        tool: &'a ToolSpec,
        input: &'a HashMap<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, PlannerError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(json!({
                "tool_id": tool.id,
                "executed": true,
                "input": input,
            }))
        })
    }
}

/// Callback invoked when an asynchronously dispatched execution errors.
pub type ErrorCallback = Box<dyn FnOnce(PlannerError) + Send + 'static>;

/// Immediate handle returned by `execute_async`.
#[derive(Debug, Clone, Copy)]
pub struct PendingExecution {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
}

// ---------------------------------------------------------------------------
// AgentPlanner
// ---------------------------------------------------------------------------

/// Drives agent tool plans. Shared across executions via `Arc`.
pub struct AgentPlanner {
    agents: Arc<AgentRegistry>,
    runner: Arc<dyn ToolRunner>,
    live: DashMap<Uuid, ExecutionStatus>,
}

impl AgentPlanner {
    /// Planner with the default echo runner.
    pub fn new(agents: Arc<AgentRegistry>) -> Self {
        Self::with_runner(agents, Arc::new(EchoToolRunner))
    }

    /// Planner with a custom tool runner.
    pub fn with_runner(agents: Arc<AgentRegistry>, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            agents,
            runner,
            live: DashMap::new(),
        }
    }

    /// Execution ids currently in flight.
    pub fn running_executions(&self) -> Vec<Uuid> {
        self.live.iter().map(|entry| *entry.key()).collect()
    }

    /// Run an agent to completion and return its result.
    ///
    /// Definition errors (unknown/disabled agent, unsupported planning style)
    /// are returned as `Err`; runtime tool failures produce an `Ok` result
    /// with status `failed` and code `EXECUTION_ERROR`.
    pub async fn execute_sync(
        &self,
        context: &AgentExecutionContext,
    ) -> Result<AgentExecutionResult, PlannerError> {
        self.run_sync(Uuid::now_v7(), context).await
    }

    /// Dispatch the synchronous path in the background and return a pending
    /// handle immediately.
    ///
    /// Spawn-side errors are delivered only through `on_error`; an execution
    /// that completes with a failed result is not re-delivered. Callers poll
    /// an external status store for completion.
    pub fn execute_async(
        self: &Arc<Self>,
        context: AgentExecutionContext,
        on_error: Option<ErrorCallback>,
    ) -> Result<PendingExecution, PlannerError> {
        // Fail fast on definition errors before detaching.
        let agent = self
            .agents
            .get(&context.agent_id)
            .ok_or(PlannerError::AgentNotFound(context.agent_id))?;
        if !agent.enabled {
            return Err(PlannerError::AgentDisabled { name: agent.name });
        }

        let execution_id = Uuid::now_v7();
        let planner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = planner.run_sync(execution_id, &context).await {
                tracing::warn!(
                    execution_id = %execution_id,
                    error = %error,
                    "async agent execution failed"
                );
                if let Some(callback) = on_error {
                    callback(error);
                }
            }
        });

        Ok(PendingExecution {
            execution_id,
            status: ExecutionStatus::Pending,
        })
    }

    async fn run_sync(
        &self,
        execution_id: Uuid,
        context: &AgentExecutionContext,
    ) -> Result<AgentExecutionResult, PlannerError> {
        let agent = self
            .agents
            .get(&context.agent_id)
            .ok_or(PlannerError::AgentNotFound(context.agent_id))?;
        if !agent.enabled {
            return Err(PlannerError::AgentDisabled { name: agent.name });
        }
        match agent.planning_style {
            PlanningStyle::Sequential | PlanningStyle::Parallel => {}
            style => return Err(PlannerError::PlanningStyleUnsupported { style }),
        }

        let started_at = Utc::now();
        let start = Instant::now();
        self.live.insert(execution_id, ExecutionStatus::Running);
        tracing::info!(
            execution_id = %execution_id,
            agent_id = %agent.id,
            style = ?agent.planning_style,
            tools = agent.tools.len(),
            "agent execution started"
        );

        let outcome = match agent.planning_style {
            PlanningStyle::Sequential => self.run_sequential(&agent, context).await,
            PlanningStyle::Parallel => self.run_parallel(&agent, context).await,
            // Checked above.
            style => return Err(PlannerError::PlanningStyleUnsupported { style }),
        };

        self.live.remove(&execution_id);
        let metrics = |steps_executed: u32| AgentMetrics {
            duration_ms: start.elapsed().as_millis() as u64,
            steps_executed,
        };

        match outcome {
            Ok((data, steps_executed)) => {
                tracing::info!(execution_id = %execution_id, "agent execution completed");
                Ok(AgentExecutionResult {
                    execution_id,
                    agent_id: agent.id,
                    status: ExecutionStatus::Completed,
                    output: Some(Value::Object(data)),
                    error: None,
                    metrics: Some(metrics(steps_executed)),
                    started_at,
                    completed_at: Some(Utc::now()),
                })
            }
            Err((error, steps_executed)) => {
                tracing::warn!(
                    execution_id = %execution_id,
                    error = %error,
                    "agent execution failed"
                );
                Ok(AgentExecutionResult {
                    execution_id,
                    agent_id: agent.id,
                    status: ExecutionStatus::Failed,
                    output: None,
                    error: Some(ExecutionErrorInfo {
                        step_id: None,
                        message: error.to_string(),
                        code: Some("EXECUTION_ERROR".to_string()),
                        details: None,
                    }),
                    metrics: Some(metrics(steps_executed)),
                    started_at,
                    completed_at: Some(Utc::now()),
                })
            }
        }
    }

    /// Tools in order; a failure consults the effective retry policy, and
    /// exhaustion fails the whole execution.
    async fn run_sequential(
        &self,
        agent: &AgentDefinition,
        context: &AgentExecutionContext,
    ) -> Result<(Map<String, Value>, u32), (PlannerError, u32)> {
        let mut data = Map::new();
        for (key, value) in &context.input {
            data.insert(key.clone(), value.clone());
        }
        let mut steps_executed = 0u32;

        for tool in &agent.tools {
            steps_executed += 1;
            let result = match self.runner.run_tool(tool, &context.input).await {
                Ok(result) => result,
                Err(error) => {
                    let retry = tool.retry.as_ref().unwrap_or(&agent.execution.retry);
                    match self.retry_tool(tool, &context.input, retry, &error).await {
                        Some(result) => result,
                        None => return Err((error, steps_executed)),
                    }
                }
            };
            data.insert(tool.id.to_string(), result);
        }

        Ok((data, steps_executed))
    }

    /// Re-attempt a failed tool per its retry policy. `None` on exhaustion.
    async fn retry_tool(
        &self,
        tool: &ToolSpec,
        input: &HashMap<String, Value>,
        retry: &RetryConfig,
        first_error: &PlannerError,
    ) -> Option<Value> {
        if !retry.enabled {
            return None;
        }
        let mut schedule = BackoffSchedule::new(retry);
        for attempt in 1..=retry.max_attempts {
            tokio::time::sleep(schedule.next_delay()).await;
            tracing::debug!(
                tool = tool.name.as_str(),
                attempt,
                max_attempts = retry.max_attempts,
                "retrying tool"
            );
            match self.runner.run_tool(tool, input).await {
                Ok(result) => return Some(result),
                Err(_) => continue,
            }
        }
        tracing::warn!(
            tool = tool.name.as_str(),
            error = %first_error,
            "tool retries exhausted"
        );
        None
    }

    /// All tools launch concurrently; failures are isolated and only the
    /// fulfilled results merge into output.
    async fn run_parallel(
        &self,
        agent: &AgentDefinition,
        context: &AgentExecutionContext,
    ) -> Result<(Map<String, Value>, u32), (PlannerError, u32)> {
        let mut data = Map::new();
        for (key, value) in &context.input {
            data.insert(key.clone(), value.clone());
        }
        let steps_executed = agent.tools.len() as u32;

        let mut tasks = JoinSet::new();
        for tool in agent.tools.clone() {
            let runner = Arc::clone(&self.runner);
            let input = context.input.clone();
            tasks.spawn(async move {
                let result = runner.run_tool(&tool, &input).await;
                (tool.id, tool.name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((tool_id, _, Ok(result))) => {
                    data.insert(tool_id.to_string(), result);
                }
                Ok((_, tool_name, Err(error))) => {
                    tracing::warn!(
                        tool = tool_name.as_str(),
                        error = %error,
                        "parallel tool failed, siblings unaffected"
                    );
                }
                Err(join_error) => {
                    tracing::warn!(error = %join_error, "parallel tool task panicked");
                }
            }
        }

        Ok((data, steps_executed))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
