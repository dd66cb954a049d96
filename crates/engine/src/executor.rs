//! Workflow execution engine.
//!
//! `WorkflowEngine` is the central orchestrator:
//! 1. Owns the `ComponentRegistry` and drives component lifecycle (see
//!    `lifecycle.rs`).
//! 2. Validates a workflow's step graph and produces a topological order.
//! 3. Dispatches steps one at a time to their component, each bounded by a
//!    timeout.
//! 4. Stops at the first failing step and records everything into a
//!    `WorkflowExecution`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use components::{Component, ComponentRequest, ComponentStatus, ServiceResponse};
use tracing::{debug, error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::dag::validate_workflow;
use crate::models::{WorkflowDefinition, WorkflowExecution, WorkflowStep};
use crate::registry::ComponentRegistry;
use crate::EngineError;

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Lifecycle orchestrator and workflow executor.
///
/// All methods take `&self`; the registry sits behind a reader/writer lock
/// that only `register_component` writes to, so any number of executions
/// and health checks can run at once. Share the engine with `Arc`.
pub struct WorkflowEngine {
    registry: RwLock<ComponentRegistry>,
    config: EngineConfig,
    /// Order computed by the last `start()`, consumed by `stop()`.
    pub(crate) started_order: Mutex<Option<Vec<String>>>,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: RwLock::new(ComponentRegistry::new()),
            config,
            started_order: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the registry. Never hold the guard across an `.await`.
    pub fn registry(&self) -> RwLockReadGuard<'_, ComponentRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// # Errors
    /// [`EngineError::Configuration`] if the name is already registered.
    pub fn register_component(&self, component: Arc<dyn Component>) -> Result<(), EngineError> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(component)
    }

    pub fn get_component(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.registry().get(name)
    }

    pub fn component_status(&self, name: &str) -> Option<ComponentStatus> {
        self.registry().status(name)
    }

    /// Run the workflow to completion or to its first failure.
    ///
    /// Never returns an error: structural problems and step failures are
    /// both reported through the returned execution's `status` and `error`.
    #[instrument(skip(self, definition), fields(workflow_id = %definition.id))]
    pub async fn execute_workflow(&self, definition: &WorkflowDefinition) -> WorkflowExecution {
        let mut execution = WorkflowExecution::new(&definition.id);

        // ------------------------------------------------------------------
        // Validate and topologically sort the step graph.
        // ------------------------------------------------------------------
        let order = match validate_workflow(definition) {
            Ok(order) => order,
            Err(e) => {
                error!(execution_id = %execution.id, "workflow rejected: {e}");
                execution.fail(e.to_string());
                return execution;
            }
        };
        info!(
            execution_id = %execution.id,
            "executing {} steps in order: {:?}",
            order.len(), order
        );

        let steps: HashMap<&str, &WorkflowStep> = definition
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s))
            .collect();

        // ------------------------------------------------------------------
        // Execute steps sequentially; stop at the first failure.
        // ------------------------------------------------------------------
        execution.mark_running();

        for step_id in &order {
            let step = steps[step_id.as_str()];

            match self.run_step(step, &execution).await {
                Ok(response) => {
                    debug!("step '{}' succeeded", step_id);
                    execution.record_success(step_id, response);
                }
                Err(e) => {
                    error!(execution_id = %execution.id, "{e}");
                    execution.record_failure(step_id, e.to_string());
                    break;
                }
            }
        }

        execution.finish(definition.steps.len());
        info!(
            execution_id = %execution.id,
            status = ?execution.status,
            "workflow '{}' finished ({} completed, {} failed)",
            definition.id,
            execution.completed_steps.len(),
            execution.failed_steps.len()
        );
        execution
    }

    // -----------------------------------------------------------------------
    // Internal: dispatch a single step.
    // -----------------------------------------------------------------------

    pub(crate) async fn run_step(
        &self,
        step: &WorkflowStep,
        execution: &WorkflowExecution,
    ) -> Result<ServiceResponse, EngineError> {
        let component = self.get_component(&step.component).ok_or_else(|| {
            EngineError::ComponentNotFound {
                step_id: step.id.clone(),
                component: step.component.clone(),
            }
        })?;

        if let Some(dep) = step.dependencies.iter().find(|d| !execution.is_completed(d)) {
            return Err(EngineError::DependencyNotMet {
                step_id: step.id.clone(),
                dependency: dep.clone(),
            });
        }

        let timeout = step
            .timeout_duration()
            .unwrap_or(self.config.default_step_timeout);
        let request = ComponentRequest::new(&step.action, step.parameters.clone(), timeout);
        let cancel = request.cancel.clone();

        debug!(
            "dispatching step '{}' to '{}' (action '{}', timeout {:?})",
            step.id, step.component, step.action, timeout
        );

        // The call runs on its own task so an abandoned request is left to
        // finish (or observe `cancel`) on its own instead of being dropped
        // mid-poll.
        let call = tokio::spawn(async move { component.process_request(request).await });

        match tokio::time::timeout(timeout, call).await {
            Err(_) => {
                cancel.cancel();
                warn!("step '{}' abandoned after {:?}", step.id, timeout);
                Err(EngineError::StepTimeout {
                    step_id: step.id.clone(),
                    timeout,
                })
            }
            Ok(Err(join_err)) => Err(EngineError::StepFailed {
                step_id: step.id.clone(),
                message: format!("component '{}' panicked: {join_err}", step.component),
            }),
            Ok(Ok(Err(e))) => Err(EngineError::StepFailed {
                step_id: step.id.clone(),
                message: e.to_string(),
            }),
            Ok(Ok(Ok(response))) if !response.success => Err(EngineError::StepFailed {
                step_id: step.id.clone(),
                message: response.error_message().to_owned(),
            }),
            Ok(Ok(Ok(response))) => Ok(response),
        }
    }
}
