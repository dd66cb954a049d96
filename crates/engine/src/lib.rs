//! `engine` crate — component registry, dependency ordering, lifecycle
//! orchestration and the workflow execution engine.

pub mod models;
pub mod error;
pub mod config;
pub mod dag;
pub mod registry;
pub mod executor;
pub mod lifecycle;

pub use models::{ExecutionStatus, WorkflowDefinition, WorkflowExecution, WorkflowStep};
pub use error::EngineError;
pub use config::EngineConfig;
pub use dag::{topological_order, validate_workflow};
pub use registry::ComponentRegistry;
pub use executor::WorkflowEngine;
pub use lifecycle::ShutdownReport;
