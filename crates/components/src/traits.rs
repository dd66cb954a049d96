//! The `Component` trait — the contract every managed service must fulfil.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{ComponentError, ServiceResponse};

/// Lifecycle state of a registered component, as tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Created,
    Initializing,
    Running,
    Error,
    Stopped,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentStatus::Created => "created",
            ComponentStatus::Initializing => "initializing",
            ComponentStatus::Running => "running",
            ComponentStatus::Error => "error",
            ComponentStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// A request dispatched to [`Component::process_request`].
///
/// `cancel` is triggered by the engine once the request has been abandoned
/// (the step timed out). Components are not forced to observe it, but long
/// running work should check it and bail out early.
#[derive(Debug, Clone)]
pub struct ComponentRequest {
    pub action: String,
    pub parameters: Map<String, Value>,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

/// Deadline used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

impl ComponentRequest {
    pub fn new(action: impl Into<String>, parameters: Map<String, Value>, timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self {
            action: action.into(),
            parameters,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Time left before the engine gives up on this request.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The core component trait.
///
/// `name` must be unique within a registry and `dependencies` lists the
/// names of components that must be started before this one.
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// One-time setup, called right before [`Component::start`].
    async fn initialize(&self) -> Result<(), ComponentError>;

    async fn start(&self) -> Result<(), ComponentError>;

    async fn stop(&self) -> Result<(), ComponentError>;

    async fn health_check(&self) -> Result<ServiceResponse, ComponentError>;

    /// Handle one workflow step.
    async fn process_request(
        &self,
        request: ComponentRequest,
    ) -> Result<ServiceResponse, ComponentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn huge_timeout_saturates_to_far_future_deadline() {
        let request = ComponentRequest::new("run", Map::new(), Duration::MAX);
        assert!(request.remaining() >= FAR_FUTURE - Duration::from_secs(1));
        assert!(!request.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_tracks_the_timeout() {
        let request = ComponentRequest::new("run", Map::new(), Duration::from_secs(5));
        assert!(request.remaining() <= Duration::from_secs(5));
        assert!(request.remaining() > Duration::from_secs(4));
    }
}
