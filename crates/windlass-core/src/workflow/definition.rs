//! Workflow and agent definition parsing and structural validation.
//!
//! Converts YAML/JSON into the canonical definitions and validates the
//! structural constraints the driver relies on (unique IDs, resolvable step
//! references, kind/config agreement). Payload-level schema validation is an
//! external concern.

use std::collections::HashSet;

use thiserror::Error;
use windlass_types::agent::AgentDefinition;
use windlass_types::workflow::{RetryConfig, StepConfig, StepType, WorkflowDefinition};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum number of steps in a workflow definition.
pub const MAX_STEPS: usize = 100;

/// Maximum number of tools in an agent plan.
pub const MAX_TOOLS: usize = 50;

/// Retry attempts bound (inclusive).
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised when parsing or validating definitions.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// YAML/JSON parse failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// A step references another step that does not exist.
    #[error("step '{step_id}' references unknown step '{reference}'")]
    UnknownStepReference { step_id: String, reference: String },
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML string into a validated `WorkflowDefinition`.
///
/// Runs `validate_definition` after deserialization, so the returned value
/// is guaranteed to be structurally valid.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, DefinitionError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| DefinitionError::Parse(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Parse a JSON string into a validated `WorkflowDefinition`.
pub fn parse_workflow_json(json: &str) -> Result<WorkflowDefinition, DefinitionError> {
    let def: WorkflowDefinition =
        serde_json::from_str(json).map_err(|e| DefinitionError::Parse(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

// ---------------------------------------------------------------------------
// Workflow validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - Name is non-empty
/// - 1..=100 steps
/// - All step IDs are unique
/// - `start_step_id` resolves to a step
/// - `fallback_step_id`, condition then/else targets, and loop `step_ids`
///   reference existing steps
/// - Each step's `type` discriminant agrees with its `config` variant
/// - Retry `max_attempts` (step-level and global) is within 1..=10
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), DefinitionError> {
    if def.name.is_empty() {
        return Err(DefinitionError::Validation(
            "workflow name must not be empty".to_string(),
        ));
    }

    if def.steps.is_empty() {
        return Err(DefinitionError::Validation(
            "workflow must have at least one step".to_string(),
        ));
    }
    if def.steps.len() > MAX_STEPS {
        return Err(DefinitionError::Validation(format!(
            "workflow has {} steps, maximum is {}",
            def.steps.len(),
            MAX_STEPS
        )));
    }

    // Unique step IDs
    let mut step_ids = HashSet::new();
    for step in &def.steps {
        if !step_ids.insert(step.id.as_str()) {
            return Err(DefinitionError::Validation(format!(
                "duplicate step ID: '{}'",
                step.id
            )));
        }
    }

    if !step_ids.contains(def.start_step_id.as_str()) {
        return Err(DefinitionError::Validation(format!(
            "start_step_id '{}' does not match any step",
            def.start_step_id
        )));
    }

    for step in &def.steps {
        // Kind discriminant must agree with the config payload.
        let config_type = config_step_type(&step.config);
        if step.step_type != config_type {
            return Err(DefinitionError::Validation(format!(
                "step '{}' is declared as {:?} but its config is {:?}",
                step.id, step.step_type, config_type
            )));
        }

        if let Some(fallback) = &step.fallback_step_id {
            if !step_ids.contains(fallback.as_str()) {
                return Err(DefinitionError::UnknownStepReference {
                    step_id: step.id.clone(),
                    reference: fallback.clone(),
                });
            }
        }

        match &step.config {
            StepConfig::Condition {
                then_steps,
                else_steps,
                ..
            } => {
                for reference in then_steps.iter().chain(else_steps.iter()) {
                    if !step_ids.contains(reference.as_str()) {
                        return Err(DefinitionError::UnknownStepReference {
                            step_id: step.id.clone(),
                            reference: reference.clone(),
                        });
                    }
                }
            }
            StepConfig::Loop {
                step_ids: nested, ..
            } => {
                for reference in nested {
                    if !step_ids.contains(reference.as_str()) {
                        return Err(DefinitionError::UnknownStepReference {
                            step_id: step.id.clone(),
                            reference: reference.clone(),
                        });
                    }
                }
            }
            _ => {}
        }

        if let Some(retry) = &step.retry {
            validate_retry(retry, &format!("step '{}'", step.id))?;
        }
    }

    if let Some(retry) = &def.global_retry {
        validate_retry(retry, "global_retry")?;
    }

    Ok(())
}

fn validate_retry(retry: &RetryConfig, context: &str) -> Result<(), DefinitionError> {
    if retry.max_attempts == 0 || retry.max_attempts > MAX_RETRY_ATTEMPTS {
        return Err(DefinitionError::Validation(format!(
            "{context}: max_attempts must be within 1..={MAX_RETRY_ATTEMPTS}, got {}",
            retry.max_attempts
        )));
    }
    Ok(())
}

/// The step kind implied by a config payload.
pub fn config_step_type(config: &StepConfig) -> StepType {
    match config {
        StepConfig::Transform { .. } => StepType::Transform,
        StepConfig::Match { .. } => StepType::Match,
        StepConfig::Reconcile { .. } => StepType::Reconcile,
        StepConfig::Api { .. } => StepType::Api,
        StepConfig::Database { .. } => StepType::Database,
        StepConfig::Generate { .. } => StepType::Generate,
        StepConfig::Agent { .. } => StepType::Agent,
        StepConfig::Condition { .. } => StepType::Condition,
        StepConfig::Loop { .. } => StepType::Loop,
        StepConfig::Delay { .. } => StepType::Delay,
        StepConfig::Human { .. } => StepType::Human,
        StepConfig::Notification { .. } => StepType::Notification,
        StepConfig::Webhook { .. } => StepType::Webhook,
    }
}

// ---------------------------------------------------------------------------
// Agent validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on an `AgentDefinition`.
pub fn validate_agent(def: &AgentDefinition) -> Result<(), DefinitionError> {
    if def.name.is_empty() {
        return Err(DefinitionError::Validation(
            "agent name must not be empty".to_string(),
        ));
    }
    if def.tools.len() > MAX_TOOLS {
        return Err(DefinitionError::Validation(format!(
            "agent has {} tools, maximum is {}",
            def.tools.len(),
            MAX_TOOLS
        )));
    }
    let mut tool_ids = HashSet::new();
    for tool in &def.tools {
        if !tool_ids.insert(tool.id) {
            return Err(DefinitionError::Validation(format!(
                "duplicate tool ID: '{}'",
                tool.id
            )));
        }
        if let Some(retry) = &tool.retry {
            validate_retry(retry, &format!("tool '{}'", tool.name))?;
        }
    }
    validate_retry(&def.execution.retry, "execution.retry")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
