//! Component-level error type.

use thiserror::Error;

/// Errors returned by a component's lifecycle or request methods.
///
/// The engine never inspects the variant to decide on retries (there are
/// none); it only uses it to render the failure message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// The operation ran and failed.
    #[error("component operation failed: {0}")]
    Failed(String),

    /// The component cannot serve the call right now (not started, shut down, ...).
    #[error("component unavailable: {0}")]
    Unavailable(String),
}

impl ComponentError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
