//! Component lifecycle: ordered start, best-effort stop, the scoped
//! `lifecycle` helper and the aggregate health check.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError};

use components::{ComponentStatus, ServiceResponse};
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::executor::WorkflowEngine;
use crate::EngineError;

/// Outcome of [`WorkflowEngine::stop`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Components stopped cleanly, in stop order.
    pub stopped: Vec<String>,
    /// `(component, error message)` for every stop attempt that failed.
    pub failures: Vec<(String, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl WorkflowEngine {
    /// Initialize and start every component in dependency order.
    ///
    /// Fails fast: the first error is returned and later components are not
    /// touched. Components that already started are left running; call
    /// [`WorkflowEngine::stop`] to tear them down.
    ///
    /// # Errors
    /// - [`EngineError::Cycle`] / [`EngineError::Configuration`] if no
    ///   startup order exists.
    /// - [`EngineError::ComponentLifecycle`] if `initialize` or `start` fails.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), EngineError> {
        let order = self.registry().get_startup_order()?;
        info!("starting {} components in order: {:?}", order.len(), order);
        *self
            .started_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(order.clone());

        for name in &order {
            let Some(managed) = self.registry().managed(name) else {
                continue;
            };
            let component = Arc::clone(managed.component());

            managed.set_status(ComponentStatus::Initializing);
            if let Err(e) = component.initialize().await {
                managed.set_status(ComponentStatus::Error);
                error!("component '{}' failed to initialize: {}", name, e);
                return Err(EngineError::lifecycle(name.as_str(), "initialize", e));
            }

            if let Err(e) = component.start().await {
                managed.set_status(ComponentStatus::Error);
                error!("component '{}' failed to start: {}", name, e);
                return Err(EngineError::lifecycle(name.as_str(), "start", e));
            }
            managed.set_status(ComponentStatus::Running);
            info!("component '{}' running", name);
        }

        Ok(())
    }

    /// Stop components in reverse of the last startup order.
    ///
    /// Every component gets a stop attempt; failures are collected into the
    /// report rather than returned. Consumes the recorded order, so a second
    /// call without a new `start()` does nothing.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let Some(order) = self
            .started_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            info!("stop requested but no components were started");
            return report;
        };

        for name in order.iter().rev() {
            let Some(managed) = self.registry().managed(name) else {
                continue;
            };
            let component = Arc::clone(managed.component());

            match component.stop().await {
                Ok(()) => {
                    managed.set_status(ComponentStatus::Stopped);
                    info!("component '{}' stopped", name);
                    report.stopped.push(name.clone());
                }
                Err(e) => {
                    managed.set_status(ComponentStatus::Error);
                    warn!("component '{}' failed to stop: {}", name, e);
                    report.failures.push((name.clone(), e.to_string()));
                }
            }
        }

        report
    }

    /// Run `body` between `start()` and `stop()`.
    ///
    /// `stop()` runs exactly once on every exit path once `start()` has
    /// succeeded: normal return, an `Err` from `body`, a panic in `body`
    /// (re-raised after the stop), or this future being dropped (the stop is
    /// then spawned onto the current runtime). If `start()` itself fails
    /// nothing is stopped and the error is returned. Likewise, if this
    /// future is dropped while `start()` is still in progress, components
    /// that already started are left running; call
    /// [`WorkflowEngine::stop`] to tear them down.
    pub async fn lifecycle<F, Fut, T, E>(self: &Arc<Self>, body: F) -> Result<T, E>
    where
        F: FnOnce(Arc<WorkflowEngine>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<EngineError>,
    {
        self.start().await?;
        let mut guard = StopGuard {
            engine: Some(Arc::clone(self)),
        };

        let outcome = AssertUnwindSafe(body(Arc::clone(self))).catch_unwind().await;

        if let Some(stop) = guard.disarm() {
            match stop.await {
                Ok(report) if !report.is_clean() => {
                    warn!("shutdown finished with {} failures", report.failures.len());
                }
                Ok(_) => {}
                Err(e) => error!("shutdown task failed: {e}"),
            }
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Check every component concurrently and aggregate the results.
    ///
    /// The aggregate succeeds only if every component reports healthy. A
    /// component whose check errors, panics or exceeds the configured
    /// health-check timeout counts as unhealthy; nothing is propagated.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> ServiceResponse {
        let components = self.registry().get_all();
        let timeout = self.config().health_check_timeout;

        // Each check runs on its own task so a panicking component is
        // recorded as unhealthy instead of unwinding through the aggregate.
        let checks = components.into_iter().map(|(name, component)| async move {
            let check = tokio::spawn(async move { component.health_check().await });
            let entry = match tokio::time::timeout(timeout, check).await {
                Ok(Ok(Ok(resp))) if resp.success => json!({
                    "healthy": true,
                    "detail": resp.data.map(Value::Object).unwrap_or(Value::Null),
                }),
                Ok(Ok(Ok(resp))) => json!({ "healthy": false, "detail": resp.error_message() }),
                Ok(Ok(Err(e))) => json!({ "healthy": false, "detail": e.to_string() }),
                Ok(Err(join_err)) => json!({
                    "healthy": false,
                    "detail": format!("health check panicked: {join_err}"),
                }),
                Err(_) => json!({
                    "healthy": false,
                    "detail": format!("health check timed out after {timeout:?}"),
                }),
            };
            (name, entry)
        });

        let results: Map<String, Value> = join_all(checks).await.into_iter().collect();

        let mut unhealthy: Vec<&str> = results
            .iter()
            .filter(|(_, entry)| entry["healthy"] != Value::Bool(true))
            .map(|(name, _)| name.as_str())
            .collect();
        unhealthy.sort_unstable();

        let checked = results.len();
        let response = if unhealthy.is_empty() {
            ServiceResponse::ok_with(Value::Object(results))
        } else {
            warn!("unhealthy components: {:?}", unhealthy);
            ServiceResponse {
                success: false,
                error: Some(format!("unhealthy components: {}", unhealthy.join(", "))),
                data: Some(results),
                metadata: None,
            }
        };
        response.with_metadata("checked", json!(checked))
    }
}

/// Stops the engine if the `lifecycle` future is dropped before it could
/// do so itself.
struct StopGuard {
    engine: Option<Arc<WorkflowEngine>>,
}

impl StopGuard {
    /// Spawn the stop as its own task so it completes even if the caller
    /// is cancelled while awaiting it.
    fn disarm(&mut self) -> Option<JoinHandle<ShutdownReport>> {
        let engine = self.engine.take()?;
        Some(tokio::spawn(async move { engine.stop().await }))
    }
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("lifecycle scope cancelled, stopping components in the background");
                handle.spawn(async move { engine.stop().await });
            }
            Err(_) => error!("lifecycle scope dropped outside a runtime; components were not stopped"),
        }
    }
}
