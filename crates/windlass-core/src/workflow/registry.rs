//! Shared workflow and agent registries.
//!
//! Explicitly constructed, id-indexed registries passed by `Arc` into the
//! driver and planner. Definitions are validated on registration;
//! registration must happen before any execution referencing them begins.

use dashmap::DashMap;
use uuid::Uuid;
use windlass_types::agent::AgentDefinition;
use windlass_types::workflow::WorkflowDefinition;

use super::definition::{validate_agent, validate_definition, DefinitionError};

// ---------------------------------------------------------------------------
// WorkflowRegistry
// ---------------------------------------------------------------------------

/// Registry of workflow definitions, indexed by id.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    workflows: DashMap<Uuid, WorkflowDefinition>,
}

impl WorkflowRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            workflows: DashMap::new(),
        }
    }

    /// Validate and register a definition.
    ///
    /// An existing definition with the same id is replaced.
    pub fn register(&self, definition: WorkflowDefinition) -> Result<(), DefinitionError> {
        validate_definition(&definition)?;
        tracing::debug!(
            workflow_id = %definition.id,
            name = definition.name.as_str(),
            "workflow registered"
        );
        self.workflows.insert(definition.id, definition);
        Ok(())
    }

    /// Look up a definition by id.
    pub fn get(&self, id: &Uuid) -> Option<WorkflowDefinition> {
        self.workflows.get(id).map(|entry| entry.clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<WorkflowDefinition> {
        self.workflows.remove(id).map(|(_, definition)| definition)
    }

    /// Drop all registrations (shutdown path).
    pub fn clear(&self) {
        self.workflows.clear();
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

/// Registry of agent definitions, indexed by id.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<Uuid, AgentDefinition>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
        }
    }

    /// Validate and register an agent definition.
    pub fn register(&self, definition: AgentDefinition) -> Result<(), DefinitionError> {
        validate_agent(&definition)?;
        tracing::debug!(
            agent_id = %definition.id,
            name = definition.name.as_str(),
            "agent registered"
        );
        self.agents.insert(definition.id, definition);
        Ok(())
    }

    /// Look up an agent by id.
    pub fn get(&self, id: &Uuid) -> Option<AgentDefinition> {
        self.agents.get(id).map(|entry| entry.clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<AgentDefinition> {
        self.agents.remove(id).map(|(_, definition)| definition)
    }

    /// Drop all registrations (shutdown path).
    pub fn clear(&self) {
        self.agents.clear();
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use windlass_types::workflow::{
        OnErrorPolicy, StepConfig, StepType, WorkflowCategory, WorkflowStep, WorkflowTrigger,
    };

    fn minimal_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            id: Uuid::now_v7(),
            name: "registry-test".to_string(),
            description: None,
            version: "1.0".to_string(),
            trigger: WorkflowTrigger::Manual {},
            steps: vec![WorkflowStep {
                id: "pause".to_string(),
                name: "Pause".to_string(),
                step_type: StepType::Delay,
                config: StepConfig::Delay { duration_ms: 0 },
                retry: None,
                timeout_ms: None,
                on_error: OnErrorPolicy::Fail,
                fallback_step_id: None,
                circuit_breaker: None,
                metadata: None,
            }],
            start_step_id: "pause".to_string(),
            state_schema: None,
            initial_state: None,
            global_retry: None,
            error_handler: None,
            tags: vec![],
            category: WorkflowCategory::Automation,
            author: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            enabled: true,
            deprecated: false,
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = WorkflowRegistry::new();
        let workflow = minimal_workflow();
        let id = workflow.id;
        registry.register(workflow).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).unwrap().name, "registry-test");
        assert!(registry.get(&Uuid::now_v7()).is_none());
    }

    #[test]
    fn test_register_rejects_invalid() {
        let registry = WorkflowRegistry::new();
        let mut workflow = minimal_workflow();
        workflow.start_step_id = "missing".to_string();
        assert!(registry.register(workflow).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = WorkflowRegistry::new();
        let workflow = minimal_workflow();
        let id = workflow.id;
        registry.register(workflow).unwrap();
        assert!(registry.remove(&id).is_some());
        assert!(registry.is_empty());

        registry.register(minimal_workflow()).unwrap();
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = WorkflowRegistry::new();
        let mut workflow = minimal_workflow();
        let id = workflow.id;
        registry.register(workflow.clone()).unwrap();
        workflow.version = "2.0".to_string();
        registry.register(workflow).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).unwrap().version, "2.0");
    }
}
