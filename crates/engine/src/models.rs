//! Core domain models for the workflow engine.
//!
//! Definitions are plain data and can be loaded from JSON. Executions are
//! created per `execute_workflow` call; persisting either is up to the
//! caller.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use components::ServiceResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// A single node of the workflow DAG, bound to one component action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique identifier within the workflow (referenced by `dependencies`).
    pub id: String,
    pub name: String,
    /// Name of the registered component that handles this step.
    pub component: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Ids of steps that must complete before this one is dispatched.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Timeout in seconds; the engine default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl WorkflowStep {
    pub fn new(
        id: impl Into<String>,
        component: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            component: component.into(),
            action: action.into(),
            parameters: Map::new(),
            dependencies: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.dependencies.push(step_id.into());
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// The step's own timeout, if it declares a usable one.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A declarative workflow. List order of `steps` carries no meaning; the
/// engine derives the execution order from the dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// The record of one `execute_workflow` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    /// Response per attempted step. A failed step holds a failure envelope
    /// carrying the same message as `error`.
    pub step_results: BTreeMap<String, ServiceResponse>,
    /// Step ids in the order they were attempted.
    pub execution_order: Vec<String>,
    /// Set iff `status` is `Failed`.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Pending,
            completed_steps: Vec::new(),
            failed_steps: Vec::new(),
            step_results: BTreeMap::new(),
            execution_order: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_completed(&self, step_id: &str) -> bool {
        self.completed_steps.iter().any(|s| s == step_id)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// Wall-clock time between start and finish, once finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    pub(crate) fn record_success(&mut self, step_id: &str, response: ServiceResponse) {
        self.execution_order.push(step_id.to_owned());
        self.step_results.insert(step_id.to_owned(), response);
        self.completed_steps.push(step_id.to_owned());
    }

    pub(crate) fn record_failure(&mut self, step_id: &str, message: String) {
        self.execution_order.push(step_id.to_owned());
        self.step_results
            .insert(step_id.to_owned(), ServiceResponse::fail(message.clone()));
        self.failed_steps.push(step_id.to_owned());
        self.error = Some(message);
    }

    /// Terminal failure that happened before any step ran.
    pub(crate) fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.status = ExecutionStatus::Failed;
        self.finished_at = Some(Utc::now());
    }

    /// Settle the final status: completed only if nothing failed and every
    /// one of the workflow's `total_steps` completed.
    pub(crate) fn finish(&mut self, total_steps: usize) {
        let all_done = self.failed_steps.is_empty() && self.completed_steps.len() == total_steps;
        if all_done {
            self.status = ExecutionStatus::Completed;
            self.error = None;
        } else {
            self.status = ExecutionStatus::Failed;
            if self.error.is_none() {
                self.error = Some(format!(
                    "workflow '{}' stopped after {} of {} steps",
                    self.workflow_id,
                    self.completed_steps.len(),
                    total_steps
                ));
            }
        }
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_deserializes_with_defaults() {
        let step: WorkflowStep = serde_json::from_value(json!({
            "id": "fetch",
            "name": "Fetch data",
            "component": "db",
            "action": "query"
        }))
        .unwrap();

        assert!(step.dependencies.is_empty());
        assert!(step.parameters.is_empty());
        assert_eq!(step.timeout, None);
        assert_eq!(step.timeout_duration(), None);
    }

    #[test]
    fn timeout_duration_rejects_unusable_values() {
        let step = WorkflowStep::new("a", "db", "query");
        assert_eq!(
            step.clone().with_timeout(1.5).timeout_duration(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(step.clone().with_timeout(0.0).timeout_duration(), None);
        assert_eq!(step.clone().with_timeout(-3.0).timeout_duration(), None);
        assert_eq!(step.with_timeout(f64::NAN).timeout_duration(), None);
    }

    #[test]
    fn finish_with_failure_keeps_step_error() {
        let mut exec = WorkflowExecution::new("wf");
        exec.mark_running();
        exec.record_failure("a", "step 'a' failed: boom".into());
        exec.finish(2);

        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.error.as_deref(), Some("step 'a' failed: boom"));
        assert_eq!(exec.failed_steps, vec!["a"]);
        assert!(exec.is_terminal());
        assert!(exec.duration().is_some());
    }

    #[test]
    fn finish_with_missing_steps_is_failed() {
        let mut exec = WorkflowExecution::new("wf");
        exec.record_success("a", ServiceResponse::ok());
        exec.finish(2);

        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert!(exec.error.is_some());
    }

    #[test]
    fn execution_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ExecutionStatus::Completed).unwrap(),
            json!("completed")
        );
    }
}
