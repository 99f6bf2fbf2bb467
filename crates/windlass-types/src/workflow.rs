//! Workflow domain types for Windlass.
//!
//! Defines the canonical representation for workflows: the tagged-union step
//! configuration DSL (thirteen step kinds), per-step retry/circuit-breaker/
//! error policy, trigger configuration, and the execution envelopes
//! (`WorkflowExecutionContext`, `WorkflowExecutionResult`) exchanged with the
//! driver.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow Definition (immutable template)
// ---------------------------------------------------------------------------

/// The canonical workflow definition.
///
/// Registered once in a `WorkflowRegistry` and read-only during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// UUIDv7 assigned on first registration.
    pub id: Uuid,
    /// Human-readable workflow name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Semantic version string (e.g. "1.0.0").
    pub version: String,
    /// How this workflow is started (data only; firing is a collaborator concern).
    pub trigger: WorkflowTrigger,
    /// Ordered list of steps. The default execution order follows this array.
    pub steps: Vec<WorkflowStep>,
    /// ID of the step the driver starts from.
    pub start_step_id: String,
    /// Advisory schema for the state blackboard. Never enforced by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_schema: Option<HashMap<String, Value>>,
    /// Template defaults seeded into state before caller input is merged over them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<HashMap<String, Value>>,
    /// Fallback retry policy for steps with `on_error = retry` and no own config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_retry: Option<RetryConfig>,
    /// Workflow-level error handling policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handler: Option<ErrorHandlerConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub category: WorkflowCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Disabled workflows are refused by the driver.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub deprecated: bool,
}

/// Coarse workflow classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowCategory {
    Automation,
    Reconciliation,
    Consulting,
    Custom,
}

/// Workflow-level error handling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlerConfig {
    pub strategy: ErrorStrategy,
    /// Whether a failure should raise a notification (collaborator concern).
    #[serde(default = "default_true")]
    pub notification: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    Fail,
    Continue,
    Rollback,
}

// ---------------------------------------------------------------------------
// Trigger Configuration
// ---------------------------------------------------------------------------

/// How a workflow can be started. Triggers are declarative data; scheduling
/// and webhook routing live in external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowTrigger {
    /// Started explicitly by a caller.
    Manual {},
    /// Cron schedule.
    Schedule {
        cron: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    /// Incoming webhook.
    Webhook {
        path: String,
        #[serde(default = "default_webhook_trigger_method")]
        method: String,
    },
    /// Internal event bus.
    Event {
        event_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conditions: Option<Vec<Condition>>,
    },
    /// Direct API invocation.
    Api { endpoint: String },
}

fn default_webhook_trigger_method() -> String {
    "POST".to_string()
}

// ---------------------------------------------------------------------------
// Workflow Step
// ---------------------------------------------------------------------------

/// A single step in a workflow. Read-only during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// User-defined step ID (e.g. "fetch-invoices"). Unique within a workflow.
    pub id: String,
    /// Human-readable step name.
    pub name: String,
    /// The kind of step. Must agree with the `config` variant.
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Step-specific configuration payload.
    pub config: StepConfig,
    /// Retry configuration consulted when `on_error` is `retry`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    /// Per-attempt timeout in milliseconds. Elapse counts as a step failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// What the driver does when this step fails.
    #[serde(default)]
    pub on_error: OnErrorPolicy,
    /// Step to jump to on failure (for `fallback`, and after retry exhaustion).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_step_id: Option<String>,
    /// Per-step circuit breaker. Disabled unless explicitly enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    /// Extensible metadata (never consulted by the engine).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

/// The kind of step in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Transform,
    Match,
    Reconcile,
    Api,
    Database,
    Generate,
    Agent,
    Condition,
    Loop,
    Delay,
    Human,
    Notification,
    Webhook,
}

/// Driver policy for a failed step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorPolicy {
    /// Terminate the run (default).
    #[default]
    Fail,
    /// Record the node as skipped and advance with a null result.
    Skip,
    /// Re-attempt per the step's (or the workflow's global) retry config.
    Retry,
    /// Jump directly to `fallback_step_id`.
    Fallback,
}

/// Step-specific configuration payload.
///
/// Internally tagged by `type` to match the definition structure:
/// ```yaml
/// config:
///   type: transform
///   mapping:
///     total: "invoices.total"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Project dotted state paths into a fresh result object.
    Transform {
        /// target field -> dotted source path into state.
        mapping: HashMap<String, String>,
    },
    /// Pattern matching over state fields.
    Match {
        pattern: String,
        fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
    /// Reconcile two state sources under a strategy.
    Reconcile {
        source_a: String,
        source_b: String,
        #[serde(default)]
        matching_rules: Vec<Condition>,
        strategy: ReconcileStrategy,
    },
    /// Call an external HTTP API; the JSON response becomes the step result.
    Api {
        endpoint: String,
        method: HttpMethod,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<HashMap<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth: Option<ApiAuth>,
    },
    /// Database operation, delegated to an external connector.
    Database {
        operation: DatabaseOperation,
        table: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<HashMap<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<HashMap<String, Value>>,
    },
    /// Render a document from a template.
    Generate {
        template: String,
        format: GenerateFormat,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variables: Option<HashMap<String, Value>>,
    },
    /// Delegate to a registered agent.
    Agent {
        agent_id: Uuid,
        #[serde(default)]
        input: HashMap<String, Value>,
        /// When false the agent is dispatched asynchronously and the step
        /// result is a pending handle instead of the agent output.
        #[serde(default = "default_true")]
        wait_for_completion: bool,
    },
    /// Evaluate conditions against state and branch.
    Condition {
        conditions: Vec<Condition>,
        /// Branch taken when the conditions evaluate true. Only the first
        /// target is honored by the driver.
        #[serde(rename = "then")]
        then_steps: Vec<String>,
        /// Branch taken when false. Empty means the run ends.
        #[serde(rename = "else", default, skip_serializing_if = "Vec::is_empty")]
        else_steps: Vec<String>,
    },
    /// Execute nested steps once per item of an array in state.
    Loop {
        /// Dotted state path that must resolve to an array.
        items: String,
        /// IDs of steps executed per item, against a scoped sub-state.
        step_ids: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
    },
    /// Sleep for a fixed duration.
    Delay { duration_ms: u64 },
    /// Human approval gate, delegated to an external task system.
    Human {
        prompt: String,
        #[serde(default = "default_true")]
        required: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assign_to: Option<Uuid>,
    },
    /// Send a notification, delegated to an external channel.
    Notification {
        channel: NotificationChannel,
        template: String,
        recipients: Vec<String>,
    },
    /// Fire-and-forget HTTP call; the response code never fails the step.
    Webhook {
        url: String,
        #[serde(default)]
        method: WebhookMethod,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<HashMap<String, Value>>,
    },
}

/// Strategy for the reconcile step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStrategy {
    Merge,
    PreferA,
    PreferB,
    Manual,
}

/// HTTP method for api steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

/// HTTP method for webhook steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    #[default]
    Post,
    Put,
}

/// Authentication configuration for api steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAuth {
    #[serde(rename = "type")]
    pub kind: ApiAuthKind,
    /// Scheme-specific settings (token name, header name, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiAuthKind {
    Bearer,
    Basic,
    ApiKey,
    Oauth,
}

/// Operation kind for database steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseOperation {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
}

/// Output format for generate steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateFormat {
    Html,
    Pdf,
    Markdown,
    Json,
    Csv,
}

/// Delivery channel for notification steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Slack,
    Sms,
    InApp,
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// One field/operator/value predicate evaluated against state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into state.
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison operand. Ignored by exists/not_exists.
    #[serde(default)]
    pub value: Value,
    /// How this condition combines with the running result (default and).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    Exists,
    NotExists,
    Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

// ---------------------------------------------------------------------------
// Retry / Circuit Breaker
// ---------------------------------------------------------------------------

/// Retry policy for a step or an agent's tool executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of attempts, 1..=10 (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Delay before the first attempt, in milliseconds (default 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Exponential backoff ceiling, in milliseconds (default 60000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            backoff: BackoffStrategy::default(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Delay strategy between retry attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay.
    Linear,
    /// Delay doubles each attempt, capped at `max_delay_ms`.
    #[default]
    Exponential,
    /// Constant delay.
    Fixed,
}

/// Circuit breaker policy for a step, keyed per (workflow, step) by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Consecutive failures that trip the circuit open (default 5).
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Half-open successes required to close the circuit (default 2).
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// How long an open circuit stays open before probing, in ms (default 60000).
    #[serde(default = "default_breaker_timeout_ms")]
    pub timeout_ms: u64,
    /// Probe budget while half-open (default 3).
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_ms: default_breaker_timeout_ms(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_breaker_timeout_ms() -> u64 {
    60_000
}

fn default_half_open_max_calls() -> u32 {
    3
}

// ---------------------------------------------------------------------------
// Execution Envelopes
// ---------------------------------------------------------------------------

/// Scheduling priority attached to execution requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Terminal and in-flight execution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

/// Caller-supplied request to run a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionContext {
    pub workflow_id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    /// State overlay merged over the definition's `initial_state`.
    #[serde(default)]
    pub input: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub priority: Priority,
    /// Whether the caller waits for the result in-line.
    #[serde(default)]
    pub sync: bool,
}

/// Structured error attached to a failed execution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionErrorInfo {
    /// Step that caused the failure, when attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

/// Aggregated per-run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub duration_ms: u64,
    /// Nodes that left `pending`.
    pub steps_executed: u32,
    pub steps_succeeded: u32,
    pub steps_failed: u32,
    /// Sum of per-node retry counters.
    pub retries: u32,
}

/// Terminal, immutable result of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    /// UUIDv7 execution ID.
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    /// Final state blackboard on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ExecutionMetrics>,
    /// State as of the last successful step, preserved on failure for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<HashMap<String, Value>>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, step_type: StepType, config: StepConfig) -> WorkflowStep {
        WorkflowStep {
            id: id.to_string(),
            name: id.to_string(),
            step_type,
            config,
            retry: None,
            timeout_ms: None,
            on_error: OnErrorPolicy::Fail,
            fallback_step_id: None,
            circuit_breaker: None,
            metadata: None,
        }
    }

    /// Build a full `WorkflowDefinition` exercising all thirteen step kinds.
    fn sample_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            id: Uuid::now_v7(),
            name: "invoice-reconciliation".to_string(),
            description: Some("Fetch, match, and reconcile invoices".to_string()),
            version: "1.0.0".to_string(),
            trigger: WorkflowTrigger::Schedule {
                cron: "0 9 * * *".to_string(),
                timezone: Some("America/New_York".to_string()),
            },
            steps: vec![
                step(
                    "project",
                    StepType::Transform,
                    StepConfig::Transform {
                        mapping: HashMap::from([(
                            "total".to_string(),
                            "input.invoice.total".to_string(),
                        )]),
                    },
                ),
                step(
                    "find-pairs",
                    StepType::Match,
                    StepConfig::Match {
                        pattern: "invoice_number".to_string(),
                        fields: vec!["invoices".to_string(), "payments".to_string()],
                        threshold: Some(0.9),
                    },
                ),
                step(
                    "reconcile",
                    StepType::Reconcile,
                    StepConfig::Reconcile {
                        source_a: "invoices".to_string(),
                        source_b: "payments".to_string(),
                        matching_rules: vec![Condition {
                            field: "amount".to_string(),
                            operator: ConditionOperator::Equals,
                            value: json!(100),
                            logical_operator: None,
                        }],
                        strategy: ReconcileStrategy::PreferA,
                    },
                ),
                step(
                    "fetch",
                    StepType::Api,
                    StepConfig::Api {
                        endpoint: "https://api.example.com/invoices/{{month}}".to_string(),
                        method: HttpMethod::Get,
                        headers: Some(HashMap::from([(
                            "Authorization".to_string(),
                            "Bearer xxx".to_string(),
                        )])),
                        body: None,
                        auth: Some(ApiAuth {
                            kind: ApiAuthKind::Bearer,
                            config: HashMap::from([(
                                "token_name".to_string(),
                                json!("API_TOKEN"),
                            )]),
                        }),
                    },
                ),
                step(
                    "persist",
                    StepType::Database,
                    StepConfig::Database {
                        operation: DatabaseOperation::Upsert,
                        table: "reconciliations".to_string(),
                        query: None,
                        data: Some(HashMap::from([("month".to_string(), json!("2026-01"))])),
                    },
                ),
                step(
                    "report",
                    StepType::Generate,
                    StepConfig::Generate {
                        template: "reconciliation-report".to_string(),
                        format: GenerateFormat::Pdf,
                        variables: None,
                    },
                ),
                step(
                    "analyze",
                    StepType::Agent,
                    StepConfig::Agent {
                        agent_id: Uuid::now_v7(),
                        input: HashMap::from([("focus".to_string(), json!("discrepancies"))]),
                        wait_for_completion: true,
                    },
                ),
                step(
                    "check",
                    StepType::Condition,
                    StepConfig::Condition {
                        conditions: vec![Condition {
                            field: "reconcile.unmatched".to_string(),
                            operator: ConditionOperator::GreaterThan,
                            value: json!(0),
                            logical_operator: None,
                        }],
                        then_steps: vec!["escalate".to_string()],
                        else_steps: vec!["report".to_string()],
                    },
                ),
                step(
                    "per-invoice",
                    StepType::Loop,
                    StepConfig::Loop {
                        items: "fetch.invoices".to_string(),
                        step_ids: vec!["persist".to_string()],
                        max_iterations: Some(100),
                    },
                ),
                step(
                    "pause",
                    StepType::Delay,
                    StepConfig::Delay { duration_ms: 500 },
                ),
                step(
                    "escalate",
                    StepType::Human,
                    StepConfig::Human {
                        prompt: "Review unmatched invoices".to_string(),
                        required: true,
                        timeout_ms: Some(3_600_000),
                        assign_to: Some(Uuid::now_v7()),
                    },
                ),
                step(
                    "announce",
                    StepType::Notification,
                    StepConfig::Notification {
                        channel: NotificationChannel::Slack,
                        template: "reconciliation-done".to_string(),
                        recipients: vec!["#finance".to_string()],
                    },
                ),
                step(
                    "ping",
                    StepType::Webhook,
                    StepConfig::Webhook {
                        url: "https://hooks.example.com/done".to_string(),
                        method: WebhookMethod::Post,
                        headers: None,
                        body: Some(HashMap::from([("run".to_string(), json!("{{month}}"))])),
                    },
                ),
            ],
            start_step_id: "project".to_string(),
            state_schema: None,
            initial_state: Some(HashMap::from([("month".to_string(), json!("2026-01"))])),
            global_retry: Some(RetryConfig::default()),
            error_handler: Some(ErrorHandlerConfig {
                strategy: ErrorStrategy::Fail,
                notification: true,
            }),
            tags: vec!["finance".to_string()],
            category: WorkflowCategory::Reconciliation,
            author: Some("finance-team".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            enabled: true,
            deprecated: false,
        }
    }

    // -----------------------------------------------------------------------
    // YAML / JSON roundtrip
    // -----------------------------------------------------------------------

    #[test]
    fn test_workflow_definition_yaml_roundtrip() {
        let original = sample_workflow();
        let yaml = serde_yaml_ng::to_string(&original).expect("serialize to YAML");

        assert!(yaml.contains("invoice-reconciliation"));
        assert!(yaml.contains("type: transform"));
        assert!(yaml.contains("type: schedule"));

        let parsed: WorkflowDefinition =
            serde_yaml_ng::from_str(&yaml).expect("deserialize from YAML");
        assert_eq!(parsed.name, "invoice-reconciliation");
        assert_eq!(parsed.steps.len(), 13);
        assert_eq!(parsed.start_step_id, "project");
        assert_eq!(parsed.category, WorkflowCategory::Reconciliation);
    }

    #[test]
    fn test_workflow_definition_json_roundtrip() {
        let original = sample_workflow();
        let json_str = serde_json::to_string_pretty(&original).expect("serialize to JSON");
        let parsed: WorkflowDefinition =
            serde_json::from_str(&json_str).expect("deserialize from JSON");
        assert_eq!(parsed.name, original.name);
        assert_eq!(parsed.steps.len(), original.steps.len());
        assert_eq!(parsed.tags, original.tags);
    }

    // -----------------------------------------------------------------------
    // StepConfig variant tags
    // -----------------------------------------------------------------------

    #[test]
    fn test_step_config_transform_serde() {
        let config = StepConfig::Transform {
            mapping: HashMap::from([("out".to_string(), "input.x".to_string())]),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"transform\""));
        let parsed: StepConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, StepConfig::Transform { .. }));
    }

    #[test]
    fn test_step_config_match_serde() {
        let config = StepConfig::Match {
            pattern: "invoice_number".to_string(),
            fields: vec!["invoices".to_string()],
            threshold: None,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"match\""));
        let parsed: StepConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, StepConfig::Match { .. }));
    }

    #[test]
    fn test_step_config_reconcile_serde() {
        let config = StepConfig::Reconcile {
            source_a: "a".to_string(),
            source_b: "b".to_string(),
            matching_rules: vec![],
            strategy: ReconcileStrategy::Merge,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"reconcile\""));
        assert!(json.contains("\"strategy\":\"merge\""));
        let parsed: StepConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, StepConfig::Reconcile { .. }));
    }

    #[test]
    fn test_step_config_api_serde() {
        let config = StepConfig::Api {
            endpoint: "https://example.com".to_string(),
            method: HttpMethod::Post,
            headers: None,
            body: Some(HashMap::from([("key".to_string(), json!("value"))])),
            auth: None,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"api\""));
        assert!(json.contains("\"method\":\"POST\""));
        let parsed: StepConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, StepConfig::Api { .. }));
    }

    #[test]
    fn test_step_config_condition_then_else_renames() {
        let config = StepConfig::Condition {
            conditions: vec![Condition {
                field: "input.flag".to_string(),
                operator: ConditionOperator::Equals,
                value: json!(true),
                logical_operator: None,
            }],
            then_steps: vec!["a".to_string()],
            else_steps: vec!["b".to_string()],
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"then\":[\"a\"]"));
        assert!(json.contains("\"else\":[\"b\"]"));
        let parsed: StepConfig = serde_json::from_str(&json).unwrap();
        match parsed {
            StepConfig::Condition {
                then_steps,
                else_steps,
                ..
            } => {
                assert_eq!(then_steps, vec!["a"]);
                assert_eq!(else_steps, vec!["b"]);
            }
            other => panic!("expected condition config, got {other:?}"),
        }
    }

    #[test]
    fn test_step_config_condition_else_defaults_empty() {
        let yaml = r#"
type: condition
conditions:
  - field: input.flag
    operator: equals
    value: true
then: [next-step]
"#;
        let parsed: StepConfig = serde_yaml_ng::from_str(yaml).unwrap();
        match parsed {
            StepConfig::Condition { else_steps, .. } => assert!(else_steps.is_empty()),
            other => panic!("expected condition config, got {other:?}"),
        }
    }

    #[test]
    fn test_step_config_loop_serde() {
        let config = StepConfig::Loop {
            items: "fetch.invoices".to_string(),
            step_ids: vec!["persist".to_string()],
            max_iterations: Some(2),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"loop\""));
        let parsed: StepConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, StepConfig::Loop { .. }));
    }

    #[test]
    fn test_step_config_agent_wait_default() {
        let yaml = r#"
type: agent
agent_id: "01938e90-0000-7000-8000-000000000009"
input:
  focus: discrepancies
"#;
        let parsed: StepConfig = serde_yaml_ng::from_str(yaml).unwrap();
        match parsed {
            StepConfig::Agent {
                wait_for_completion,
                ..
            } => assert!(wait_for_completion),
            other => panic!("expected agent config, got {other:?}"),
        }
    }

    #[test]
    fn test_step_config_webhook_method_default() {
        let yaml = r#"
type: webhook
url: https://hooks.example.com/done
"#;
        let parsed: StepConfig = serde_yaml_ng::from_str(yaml).unwrap();
        match parsed {
            StepConfig::Webhook { method, .. } => assert_eq!(method, WebhookMethod::Post),
            other => panic!("expected webhook config, got {other:?}"),
        }
    }

    #[test]
    fn test_step_config_stub_variants_serde() {
        let variants = vec![
            (
                StepConfig::Database {
                    operation: DatabaseOperation::Select,
                    table: "t".to_string(),
                    query: None,
                    data: None,
                },
                "\"type\":\"database\"",
            ),
            (
                StepConfig::Generate {
                    template: "tpl".to_string(),
                    format: GenerateFormat::Markdown,
                    variables: None,
                },
                "\"type\":\"generate\"",
            ),
            (
                StepConfig::Delay { duration_ms: 100 },
                "\"type\":\"delay\"",
            ),
            (
                StepConfig::Human {
                    prompt: "review".to_string(),
                    required: true,
                    timeout_ms: None,
                    assign_to: None,
                },
                "\"type\":\"human\"",
            ),
            (
                StepConfig::Notification {
                    channel: NotificationChannel::Email,
                    template: "t".to_string(),
                    recipients: vec!["ops@example.com".to_string()],
                },
                "\"type\":\"notification\"",
            ),
        ];
        for (config, tag) in variants {
            let json = serde_json::to_string(&config).unwrap();
            assert!(json.contains(tag), "{json} missing {tag}");
            let _parsed: StepConfig = serde_json::from_str(&json).unwrap();
        }
    }

    // -----------------------------------------------------------------------
    // Step envelope defaults
    // -----------------------------------------------------------------------

    #[test]
    fn test_workflow_step_on_error_defaults_to_fail() {
        let yaml = r#"
id: pause
name: Pause
type: delay
config:
  type: delay
  duration_ms: 10
"#;
        let parsed: WorkflowStep = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(parsed.on_error, OnErrorPolicy::Fail);
        assert!(parsed.retry.is_none());
        assert!(parsed.circuit_breaker.is_none());
    }

    // -----------------------------------------------------------------------
    // Trigger variants
    // -----------------------------------------------------------------------

    #[test]
    fn test_trigger_manual_serde() {
        let trigger = WorkflowTrigger::Manual {};
        let json = serde_json::to_string(&trigger).unwrap();
        assert!(json.contains("\"type\":\"manual\""));
        let parsed: WorkflowTrigger = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, WorkflowTrigger::Manual {}));
    }

    #[test]
    fn test_trigger_schedule_serde() {
        let trigger = WorkflowTrigger::Schedule {
            cron: "0 9 * * *".to_string(),
            timezone: None,
        };
        let json = serde_json::to_string(&trigger).unwrap();
        assert!(json.contains("\"type\":\"schedule\""));
        let parsed: WorkflowTrigger = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, WorkflowTrigger::Schedule { .. }));
    }

    #[test]
    fn test_trigger_webhook_method_default() {
        let yaml = r#"
type: webhook
path: /trigger/reconcile
"#;
        let parsed: WorkflowTrigger = serde_yaml_ng::from_str(yaml).unwrap();
        match parsed {
            WorkflowTrigger::Webhook { method, .. } => assert_eq!(method, "POST"),
            other => panic!("expected webhook trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_trigger_event_and_api_serde() {
        let event = WorkflowTrigger::Event {
            event_name: "invoice_created".to_string(),
            conditions: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"event\""));

        let api = WorkflowTrigger::Api {
            endpoint: "/run/reconcile".to_string(),
        };
        let json = serde_json::to_string(&api).unwrap();
        assert!(json.contains("\"type\":\"api\""));
    }

    // -----------------------------------------------------------------------
    // Retry / circuit breaker defaults
    // -----------------------------------------------------------------------

    #[test]
    fn test_retry_config_defaults_from_empty_yaml() {
        let config: RetryConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff, BackoffStrategy::Exponential);
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 60_000);
    }

    #[test]
    fn test_retry_config_explicit_backoff() {
        let yaml = r#"
max_attempts: 5
backoff: linear
initial_delay_ms: 50
"#;
        let config: RetryConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff, BackoffStrategy::Linear);
        assert_eq!(config.initial_delay_ms, 50);
        assert_eq!(config.max_delay_ms, 60_000);
    }

    #[test]
    fn test_circuit_breaker_defaults_from_empty_yaml() {
        let config: CircuitBreakerConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.half_open_max_calls, 3);
    }

    // -----------------------------------------------------------------------
    // Condition value objects
    // -----------------------------------------------------------------------

    #[test]
    fn test_condition_value_defaults_to_null() {
        let yaml = r#"
field: reconcile.summary
operator: exists
"#;
        let parsed: Condition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(parsed.operator, ConditionOperator::Exists);
        assert!(parsed.value.is_null());
        assert!(parsed.logical_operator.is_none());
    }

    #[test]
    fn test_condition_operator_serde_names() {
        for (op, name) in [
            (ConditionOperator::Equals, "\"equals\""),
            (ConditionOperator::NotEquals, "\"not_equals\""),
            (ConditionOperator::GreaterThan, "\"greater_than\""),
            (ConditionOperator::LessThan, "\"less_than\""),
            (ConditionOperator::Contains, "\"contains\""),
            (ConditionOperator::NotContains, "\"not_contains\""),
            (ConditionOperator::Exists, "\"exists\""),
            (ConditionOperator::NotExists, "\"not_exists\""),
            (ConditionOperator::Regex, "\"regex\""),
        ] {
            assert_eq!(serde_json::to_string(&op).unwrap(), name);
        }
    }

    // -----------------------------------------------------------------------
    // Envelopes
    // -----------------------------------------------------------------------

    #[test]
    fn test_execution_context_defaults() {
        let json = json!({
            "workflow_id": "01938e90-0000-7000-8000-000000000001",
            "user_id": "01938e90-0000-7000-8000-000000000002",
        });
        let context: WorkflowExecutionContext = serde_json::from_value(json).unwrap();
        assert_eq!(context.priority, Priority::Normal);
        assert!(!context.sync);
        assert!(context.input.is_empty());
        assert!(context.tenant_id.is_none());
    }

    #[test]
    fn test_execution_result_json_roundtrip() {
        let result = WorkflowExecutionResult {
            execution_id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            status: ExecutionStatus::Failed,
            output: None,
            error: Some(ExecutionErrorInfo {
                step_id: Some("fetch".to_string()),
                message: "api call failed with status 500".to_string(),
                code: Some("EXECUTION_ERROR".to_string()),
                details: None,
            }),
            metrics: Some(ExecutionMetrics {
                duration_ms: 42,
                steps_executed: 2,
                steps_succeeded: 1,
                steps_failed: 1,
                retries: 3,
            }),
            state: Some(HashMap::from([("project".to_string(), json!({"x": 5}))])),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        let json_str = serde_json::to_string(&result).unwrap();
        let parsed: WorkflowExecutionResult = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.status, ExecutionStatus::Failed);
        assert_eq!(
            parsed.error.as_ref().and_then(|e| e.code.as_deref()),
            Some("EXECUTION_ERROR")
        );
        assert_eq!(parsed.metrics.unwrap().retries, 3);
    }

    #[test]
    fn test_execution_status_serde() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
            ExecutionStatus::Paused,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let parsed: ExecutionStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, status);
        }
    }

    // -----------------------------------------------------------------------
    // Realistic YAML parse
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_realistic_yaml_workflow() {
        let yaml = r#"
id: "01938e90-0000-7000-8000-000000000001"
name: monthly-reconciliation
description: Fetch invoices and reconcile against payments
version: "1.0"
trigger:
  type: schedule
  cron: "0 6 1 * *"
category: reconciliation
start_step_id: fetch
created_at: "2026-01-01T00:00:00Z"
updated_at: "2026-01-01T00:00:00Z"
initial_state:
  month: "2026-01"
steps:
  - id: fetch
    name: Fetch Invoices
    type: api
    config:
      type: api
      endpoint: "https://api.example.com/invoices/{{month}}"
      method: GET
    timeout_ms: 30000
    on_error: retry
    retry:
      max_attempts: 3
      backoff: exponential
      initial_delay_ms: 500
  - id: check
    name: Any Invoices
    type: condition
    config:
      type: condition
      conditions:
        - field: fetch.count
          operator: greater_than
          value: 0
      then: [reconcile]
  - id: reconcile
    name: Reconcile
    type: reconcile
    config:
      type: reconcile
      source_a: fetch.invoices
      source_b: fetch.payments
      strategy: prefer_a
    on_error: skip
"#;
        let wf: WorkflowDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(wf.name, "monthly-reconciliation");
        assert_eq!(wf.steps.len(), 3);
        assert!(wf.enabled);
        assert!(!wf.deprecated);
        assert_eq!(wf.steps[0].on_error, OnErrorPolicy::Retry);
        assert_eq!(wf.steps[0].timeout_ms, Some(30_000));
        assert_eq!(wf.steps[2].on_error, OnErrorPolicy::Skip);
        let retry = wf.steps[0].retry.as_ref().unwrap();
        assert_eq!(retry.initial_delay_ms, 500);
        assert_eq!(retry.backoff, BackoffStrategy::Exponential);
    }
}
