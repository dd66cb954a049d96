//! `MockComponent` — a test double for `Component`.
//!
//! Records every lifecycle and request call into a journal that several
//! mocks can share, so tests can assert ordering across components.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{Component, ComponentError, ComponentRequest, ServiceResponse};

/// Call journal shared between mocks. Entries look like `"db:start"` or
/// `"db:process:query"`.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Behaviour of `process_request`, injected at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Succeed, echoing the action together with the given value.
    ReturnValue(Value),
    /// Return `success = false` with the given error.
    Unsuccessful(String),
    /// Return `Err(ComponentError::Failed)`.
    Fail(String),
    /// Sleep for the given duration, then succeed.
    Delay(Duration),
}

/// Lifecycle methods a mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialize,
    Start,
    Stop,
    HealthCheck,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Initialize => "initialize",
            Phase::Start => "start",
            Phase::Stop => "stop",
            Phase::HealthCheck => "health_check",
        }
    }
}

pub struct MockComponent {
    pub name: String,
    pub dependencies: Vec<String>,
    pub behaviour: MockBehaviour,
    pub failing: Vec<Phase>,
    /// Report `success = false` from `health_check` without erroring.
    pub unhealthy: bool,
    pub journal: Journal,
    /// Every request seen by `process_request` (in call order).
    pub requests: Arc<Mutex<Vec<ComponentRequest>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockComponent {
    /// A mock that succeeds at everything with an empty payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            behaviour: MockBehaviour::ReturnValue(json!({})),
            failing: Vec::new(),
            unhealthy: false,
            journal: journal(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Arc::clone(journal);
        self
    }

    pub fn with_behaviour(mut self, behaviour: MockBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    pub fn returning(self, value: Value) -> Self {
        self.with_behaviour(MockBehaviour::ReturnValue(value))
    }

    pub fn unsuccessful(self, msg: impl Into<String>) -> Self {
        self.with_behaviour(MockBehaviour::Unsuccessful(msg.into()))
    }

    pub fn failing(self, msg: impl Into<String>) -> Self {
        self.with_behaviour(MockBehaviour::Fail(msg.into()))
    }

    pub fn delayed(self, delay: Duration) -> Self {
        self.with_behaviour(MockBehaviour::Delay(delay))
    }

    pub fn failing_on(mut self, phase: Phase) -> Self {
        self.failing.push(phase);
        self
    }

    pub fn reporting_unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    /// Number of times `process_request` has been called.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Snapshot of the shared journal.
    pub fn journal_entries(&self) -> Vec<String> {
        lock(&self.journal).clone()
    }

    fn record(&self, entry: impl AsRef<str>) {
        lock(&self.journal).push(format!("{}:{}", self.name, entry.as_ref()));
    }

    fn lifecycle(&self, phase: Phase) -> Result<(), ComponentError> {
        self.record(phase.label());
        if self.failing.contains(&phase) {
            return Err(ComponentError::failed(format!(
                "{} failed for '{}'",
                phase.label(),
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Component for MockComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn initialize(&self) -> Result<(), ComponentError> {
        self.lifecycle(Phase::Initialize)
    }

    async fn start(&self) -> Result<(), ComponentError> {
        self.lifecycle(Phase::Start)
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        self.lifecycle(Phase::Stop)
    }

    async fn health_check(&self) -> Result<ServiceResponse, ComponentError> {
        self.lifecycle(Phase::HealthCheck)?;
        if self.unhealthy {
            return Ok(ServiceResponse::fail(format!("{} is degraded", self.name)));
        }
        Ok(ServiceResponse::ok_with(json!({ "component": self.name })))
    }

    async fn process_request(
        &self,
        request: ComponentRequest,
    ) -> Result<ServiceResponse, ComponentError> {
        self.record(format!("process:{}", request.action));
        let action = request.action.clone();
        lock(&self.requests).push(request);

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => {
                let mut out = json!({ "component": self.name, "action": action });
                if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), v.as_object()) {
                    for (k, val) in v_obj {
                        out_obj.insert(k.clone(), val.clone());
                    }
                }
                Ok(ServiceResponse::ok_with(out))
            }
            MockBehaviour::Unsuccessful(msg) => Ok(ServiceResponse::fail(msg.clone())),
            MockBehaviour::Fail(msg) => Err(ComponentError::Failed(msg.clone())),
            MockBehaviour::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(ServiceResponse::ok_with(json!({ "component": self.name, "action": action })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn request(action: &str) -> ComponentRequest {
        ComponentRequest::new(action, Map::new(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn shared_journal_records_calls_across_mocks() {
        let journal = journal();
        let db = MockComponent::new("db").with_journal(&journal);
        let cache = MockComponent::new("cache").with_journal(&journal);

        db.start().await.unwrap();
        cache.start().await.unwrap();
        cache.process_request(request("get")).await.unwrap();

        assert_eq!(
            db.journal_entries(),
            vec!["db:start", "cache:start", "cache:process:get"]
        );
        assert_eq!(cache.call_count(), 1);
        assert_eq!(db.call_count(), 0);
    }

    #[tokio::test]
    async fn returning_merges_payload_into_response() {
        let mock = MockComponent::new("svc").returning(json!({ "rows": 3 }));
        let resp = mock.process_request(request("query")).await.unwrap();

        let data = resp.data.unwrap();
        assert_eq!(data["component"], "svc");
        assert_eq!(data["action"], "query");
        assert_eq!(data["rows"], 3);
    }

    #[tokio::test]
    async fn failing_phase_only_affects_that_phase() {
        let mock = MockComponent::new("svc").failing_on(Phase::Stop);
        assert!(mock.start().await.is_ok());
        assert!(matches!(mock.stop().await, Err(ComponentError::Failed(_))));
    }

    #[tokio::test]
    async fn unsuccessful_and_failing_behaviours_differ() {
        let soft = MockComponent::new("soft").unsuccessful("bad input");
        let resp = soft.process_request(request("x")).await.unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error_message(), "bad input");

        let hard = MockComponent::new("hard").failing("crashed");
        assert!(hard.process_request(request("x")).await.is_err());
    }
}
