//! Engine-level error types.

use std::time::Duration;

use components::ComponentError;
use thiserror::Error;

/// Errors produced by the engine (registration, graph ordering, lifecycle
/// and step execution).
///
/// Structural variants (`Configuration`, `Cycle`) surface before anything
/// runs. Step variants are captured into a `WorkflowExecution` rather than
/// returned to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Structural errors ------

    /// Duplicate names, dangling references, invalid step settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Dependency graph is not acyclic. `node` is on the cycle and `path`
    /// walks it, starting and ending at `node`.
    #[error("circular dependency detected at '{node}': {}", .path.join(" -> "))]
    Cycle { node: String, path: Vec<String> },

    // ------ Step errors ------

    #[error("step '{step_id}' failed: component not found: '{component}'")]
    ComponentNotFound { step_id: String, component: String },

    #[error("step '{step_id}' failed: dependency not met: '{dependency}' has not completed")]
    DependencyNotMet { step_id: String, dependency: String },

    #[error("step '{step_id}' failed: step timeout after {timeout:?}")]
    StepTimeout { step_id: String, timeout: Duration },

    /// The component returned an error or an unsuccessful `ServiceResponse`.
    #[error("step '{step_id}' failed: {message}")]
    StepFailed { step_id: String, message: String },

    // ------ Lifecycle errors ------

    #[error("component '{component}' failed to {operation}: {source}")]
    ComponentLifecycle {
        component: String,
        operation: &'static str,
        #[source]
        source: ComponentError,
    },
}

impl EngineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn lifecycle(
        component: impl Into<String>,
        operation: &'static str,
        source: ComponentError,
    ) -> Self {
        Self::ComponentLifecycle {
            component: component.into(),
            operation,
            source,
        }
    }
}
