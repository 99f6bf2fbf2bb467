//! Step interpreter: one handler per step kind.
//!
//! `StepInterpreter::execute` dispatches exhaustively over `StepConfig`.
//! Transform, condition and loop are computed in-process against the state
//! blackboard; api and webhook go through the `HttpTransport` seam; agent
//! steps delegate to the planner. Database, generate, human, notification,
//! match and reconcile return structured stubs, their real work belongs to
//! external collaborators.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use windlass_types::agent::AgentExecutionContext;
use windlass_types::workflow::{
    ApiAuth, ApiAuthKind, ExecutionStatus, HttpMethod, Priority, StepConfig, WebhookMethod,
    WorkflowDefinition, WorkflowStep,
};

use crate::agent::planner::AgentPlanner;

use super::condition::evaluate_conditions;
use super::state::{interpolate_object, interpolate_string, resolve_path};

/// Maximum loop nesting depth.
pub const MAX_LOOP_DEPTH: u32 = 5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures raised by step handlers. Recoverable per the step's `on_error`
/// policy; the driver decides what a failure means for the run.
#[derive(Debug, Error)]
pub enum StepError {
    /// Non-2xx response from an api step.
    #[error("http request failed with status {status}")]
    Http { status: u16 },

    /// Connection-level failure from the HTTP transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The loop `items` path did not resolve to an array.
    #[error("state path '{path}' does not resolve to an array")]
    NotAnArray { path: String },

    /// A loop referenced a step id absent from the workflow.
    #[error("loop references unknown step '{0}'")]
    UnknownNestedStep(String),

    /// Loops nested deeper than `MAX_LOOP_DEPTH`.
    #[error("loop nesting exceeds depth {}", MAX_LOOP_DEPTH)]
    LoopDepthExceeded,

    /// A delegated execution (agent step) did not complete.
    #[error("step execution failed: {0}")]
    ExecutionFailed(String),

    /// The step's circuit breaker refused the call.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The step's `timeout_ms` elapsed before the handler finished.
    #[error("step timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// HTTP seam
// ---------------------------------------------------------------------------

/// Response handed back by the transport. Bodies that fail to parse as JSON
/// surface as `Value::Null`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

/// Object-safe HTTP seam with boxed futures. Api and webhook steps go
/// through this so tests can run against a local mock server.
pub trait HttpTransport: Send + Sync {
    fn request<'a>(
        &'a self,
        method: &'a str,
        url: &'a str,
        headers: Option<&'a HashMap<String, String>>,
        body: Option<Value>,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, StepError>> + Send + 'a>>;
}

/// Default transport over a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for ReqwestTransport {
    fn request<'a>(
        &'a self,
        method: &'a str,
        url: &'a str,
        headers: Option<&'a HashMap<String, String>>,
        body: Option<Value>,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, StepError>> + Send + 'a>> {
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(method.as_bytes())
                .map_err(|error| StepError::Transport(error.to_string()))?;
            let mut request = self.client.request(method, url);
            if let Some(headers) = headers {
                for (name, value) in headers {
                    request = request.header(name, value);
                }
            }
            if let Some(body) = body {
                request = request.json(&body);
            }
            let response = request
                .send()
                .await
                .map_err(|error| StepError::Transport(error.to_string()))?;
            let status = response.status().as_u16();
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            Ok(HttpResponse { status, body })
        })
    }
}

// ---------------------------------------------------------------------------
// StepInterpreter
// ---------------------------------------------------------------------------

/// Executes individual steps against a state snapshot. One interpreter is
/// built per run; it never mutates state, the driver owns the blackboard.
pub struct StepInterpreter {
    /// All workflow steps by id, for nested loop execution.
    steps: HashMap<String, WorkflowStep>,
    http: Arc<dyn HttpTransport>,
    planner: Arc<AgentPlanner>,
    /// Propagated into agent execution contexts.
    user_id: Uuid,
}

impl StepInterpreter {
    pub fn new(
        definition: &WorkflowDefinition,
        http: Arc<dyn HttpTransport>,
        planner: Arc<AgentPlanner>,
        user_id: Uuid,
    ) -> Self {
        let steps = definition
            .steps
            .iter()
            .map(|step| (step.id.clone(), step.clone()))
            .collect();
        Self {
            steps,
            http,
            planner,
            user_id,
        }
    }

    /// Execute one step against a state snapshot.
    pub async fn execute(
        &self,
        step: &WorkflowStep,
        state: &HashMap<String, Value>,
    ) -> Result<Value, StepError> {
        self.execute_at_depth(step, state, 0).await
    }

    /// Boxed for loop re-entry.
    fn execute_at_depth<'a>(
        &'a self,
        step: &'a WorkflowStep,
        state: &'a HashMap<String, Value>,
        depth: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::debug!(
                step_id = step.id.as_str(),
                step_type = ?step.step_type,
                "executing step"
            );
            match &step.config {
                StepConfig::Transform { mapping } => Ok(transform(mapping, state)),
                StepConfig::Match { .. } => Ok(json!({"matched": true, "matches": []})),
                StepConfig::Reconcile {
                    source_a,
                    source_b,
                    strategy,
                    ..
                } => Ok(json!({
                    "source_a": resolve_path(source_a, state).cloned().unwrap_or(Value::Null),
                    "source_b": resolve_path(source_b, state).cloned().unwrap_or(Value::Null),
                    "strategy": strategy,
                })),
                StepConfig::Api {
                    endpoint,
                    method,
                    headers,
                    body,
                    auth,
                } => {
                    self.api(endpoint, *method, headers.as_ref(), body.as_ref(), auth.as_ref(), state)
                        .await
                }
                StepConfig::Database {
                    operation, table, ..
                } => Ok(json!({"operation": operation, "table": table})),
                StepConfig::Generate { format, .. } => {
                    Ok(json!({"generated": true, "format": format}))
                }
                StepConfig::Agent {
                    agent_id,
                    input,
                    wait_for_completion,
                } => self.agent(*agent_id, input, *wait_for_completion, state).await,
                StepConfig::Condition { conditions, .. } => {
                    Ok(Value::Bool(evaluate_conditions(conditions, state)))
                }
                StepConfig::Loop {
                    items,
                    step_ids,
                    max_iterations,
                } => {
                    self.run_loop(items, step_ids, *max_iterations, state, depth)
                        .await
                }
                StepConfig::Delay { duration_ms } => {
                    tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                    Ok(json!({"delayed_ms": duration_ms}))
                }
                StepConfig::Human { prompt, .. } => {
                    Ok(json!({"approved": true, "prompt": prompt}))
                }
                StepConfig::Notification { channel, .. } => {
                    Ok(json!({"sent": true, "channel": channel}))
                }
                StepConfig::Webhook {
                    url,
                    method,
                    headers,
                    body,
                } => {
                    self.webhook(url, *method, headers.as_ref(), body.as_ref(), state)
                        .await
                }
            }
        })
    }

    /// Interpolates endpoint and body against state, then requires a 2xx
    /// response. The response JSON becomes the step result.
    async fn api(
        &self,
        endpoint: &str,
        method: HttpMethod,
        headers: Option<&HashMap<String, String>>,
        body: Option<&HashMap<String, Value>>,
        auth: Option<&ApiAuth>,
        state: &HashMap<String, Value>,
    ) -> Result<Value, StepError> {
        let url = interpolate_string(endpoint, state);
        let mut headers = headers.cloned().unwrap_or_default();
        if let Some(auth) = auth {
            apply_auth(&mut headers, auth);
        }
        let body = body.map(|map| to_json_object(interpolate_object(map, state)));
        let response = self.http.request(method.as_str(), &url, Some(&headers), body).await?;
        if !(200..300).contains(&response.status) {
            return Err(StepError::Http {
                status: response.status,
            });
        }
        Ok(response.body)
    }

    /// Fire-and-forget: transport errors fail the step, response codes never do.
    async fn webhook(
        &self,
        url: &str,
        method: WebhookMethod,
        headers: Option<&HashMap<String, String>>,
        body: Option<&HashMap<String, Value>>,
        state: &HashMap<String, Value>,
    ) -> Result<Value, StepError> {
        let url = interpolate_string(url, state);
        let method = match method {
            WebhookMethod::Post => "POST",
            WebhookMethod::Put => "PUT",
        };
        let body = body.map(|map| to_json_object(interpolate_object(map, state)));
        let response = self.http.request(method, &url, headers, body).await?;
        Ok(json!({"status": response.status, "sent": true}))
    }

    /// Delegate to the planner. State overlays the configured input, so step
    /// results from earlier in the run reach the agent.
    async fn agent(
        &self,
        agent_id: Uuid,
        input: &HashMap<String, Value>,
        wait_for_completion: bool,
        state: &HashMap<String, Value>,
    ) -> Result<Value, StepError> {
        let mut merged = input.clone();
        merged.extend(state.clone());
        let context = AgentExecutionContext {
            agent_id,
            user_id: self.user_id,
            tenant_id: None,
            input: merged,
            metadata: None,
            parent_execution_id: None,
            priority: Priority::Normal,
        };

        if wait_for_completion {
            let result = self
                .planner
                .execute_sync(&context)
                .await
                .map_err(|error| StepError::ExecutionFailed(error.to_string()))?;
            if result.status != ExecutionStatus::Completed {
                let message = result
                    .error
                    .map(|error| error.message)
                    .unwrap_or_else(|| "agent execution failed".to_string());
                return Err(StepError::ExecutionFailed(message));
            }
            Ok(result.output.unwrap_or(Value::Null))
        } else {
            let pending = self
                .planner
                .execute_async(context, None)
                .map_err(|error| StepError::ExecutionFailed(error.to_string()))?;
            Ok(json!({
                "execution_id": pending.execution_id,
                "status": pending.status,
            }))
        }
    }

    /// Execute the nested steps once per item, against a scoped sub-state
    /// `{...state, item, index}`. Nested results also land in the sub-state
    /// under their step id, so later nested steps can read earlier ones.
    async fn run_loop(
        &self,
        items_path: &str,
        step_ids: &[String],
        max_iterations: Option<u32>,
        state: &HashMap<String, Value>,
        depth: u32,
    ) -> Result<Value, StepError> {
        if depth >= MAX_LOOP_DEPTH {
            return Err(StepError::LoopDepthExceeded);
        }
        let items = match resolve_path(items_path, state) {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(StepError::NotAnArray {
                    path: items_path.to_string(),
                })
            }
        };
        let bound = match max_iterations {
            Some(max) => items.len().min(max as usize),
            None => items.len(),
        };

        let mut results = Vec::with_capacity(bound * step_ids.len());
        for (index, item) in items.into_iter().take(bound).enumerate() {
            let mut scoped = state.clone();
            scoped.insert("item".to_string(), item);
            scoped.insert("index".to_string(), json!(index));
            for step_id in step_ids {
                let nested = self
                    .steps
                    .get(step_id)
                    .ok_or_else(|| StepError::UnknownNestedStep(step_id.clone()))?;
                let result = self.execute_at_depth(nested, &scoped, depth + 1).await?;
                scoped.insert(step_id.clone(), result.clone());
                results.push(result);
            }
        }
        Ok(Value::Array(results))
    }
}

/// Project mapped source paths into a fresh object. Missing paths map to null.
fn transform(mapping: &HashMap<String, String>, state: &HashMap<String, Value>) -> Value {
    let mut result = Map::new();
    for (target, source) in mapping {
        let value = resolve_path(source, state).cloned().unwrap_or(Value::Null);
        result.insert(target.clone(), value);
    }
    Value::Object(result)
}

fn to_json_object(map: HashMap<String, Value>) -> Value {
    Value::Object(map.into_iter().collect())
}

fn apply_auth(headers: &mut HashMap<String, String>, auth: &ApiAuth) {
    match auth.kind {
        ApiAuthKind::Bearer | ApiAuthKind::Oauth => {
            if let Some(token) = auth.config.get("token").and_then(Value::as_str) {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
        }
        ApiAuthKind::ApiKey => {
            let name = auth
                .config
                .get("header")
                .and_then(Value::as_str)
                .unwrap_or("X-API-Key");
            if let Some(key) = auth.config.get("key").and_then(Value::as_str) {
                headers.insert(name.to_string(), key.to_string());
            }
        }
        ApiAuthKind::Basic => {
            // Credentials arrive pre-encoded.
            if let Some(credentials) = auth.config.get("credentials").and_then(Value::as_str) {
                headers.insert("Authorization".to_string(), format!("Basic {credentials}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
