//! Agent domain types for Windlass.
//!
//! An agent is a flat tool plan executed by the planner under a planning
//! style. Shares the retry/priority/status vocabulary with the workflow types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::workflow::{ExecutionErrorInfo, ExecutionStatus, Priority, RetryConfig};

// ---------------------------------------------------------------------------
// Agent Definition
// ---------------------------------------------------------------------------

/// The canonical agent definition. Registered once, read-only during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// UUIDv7 assigned on first registration.
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Semantic version string (e.g. "1.0.0").
    pub version: String,
    pub category: AgentCategory,
    /// How the planner walks the tool list.
    #[serde(default)]
    pub planning_style: PlanningStyle,
    /// Flat tool plan, at most 50 entries.
    pub tools: Vec<ToolSpec>,
    pub execution: AgentExecutionConfig,
    pub output_type: AgentOutputType,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub deprecated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCategory {
    Automation,
    Analysis,
    Generation,
    Consulting,
    Custom,
}

/// Tool-execution strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningStyle {
    /// Tools run one after another; failures consult the agent retry policy.
    #[default]
    Sequential,
    /// Tools launch concurrently; partial failures do not cancel siblings.
    Parallel,
    Hierarchical,
    Reactive,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutputType {
    Text,
    Json,
    Structured,
    Workflow,
    Report,
    Analysis,
    Recommendation,
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// One tool in an agent's plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, ToolParameter>,
    pub returns: ToolReturns,
    /// Per-invocation timeout in milliseconds (default 30000).
    #[serde(default = "default_tool_timeout_ms")]
    pub timeout_ms: u64,
    /// Tool-specific retry override. The agent-level policy applies otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Api,
    Database,
    Workflow,
    Ai,
    Transformation,
    Validation,
}

/// Parameter declaration for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Declared return shape of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolReturns {
    #[serde(rename = "type")]
    pub return_type: ParamType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

// ---------------------------------------------------------------------------
// Execution configuration
// ---------------------------------------------------------------------------

/// How an agent's plan is executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Whole-plan timeout in milliseconds (default 60000).
    #[serde(default = "default_agent_timeout_ms")]
    pub timeout_ms: u64,
    /// Per-tool retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for AgentExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            timeout_ms: default_agent_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sync,
    #[default]
    Async,
    Streaming,
}

fn default_true() -> bool {
    true
}

fn default_tool_timeout_ms() -> u64 {
    30_000
}

fn default_agent_timeout_ms() -> u64 {
    60_000
}

// ---------------------------------------------------------------------------
// Execution Envelopes
// ---------------------------------------------------------------------------

/// Caller-supplied request to run an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutionContext {
    pub agent_id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub input: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
    /// Set when an agent runs as a workflow step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Priority,
}

/// Aggregated per-run counters for an agent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub duration_ms: u64,
    /// Tools attempted.
    pub steps_executed: u32,
}

/// Terminal, immutable result of an agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutionResult {
    /// UUIDv7 execution ID.
    pub execution_id: Uuid,
    pub agent_id: Uuid,
    pub status: ExecutionStatus,
    /// Merged tool outputs keyed by tool id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AgentMetrics>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
