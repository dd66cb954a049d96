//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout applied to a step that does not declare its own.
    pub default_step_timeout: Duration,
    /// Upper bound on a single component's `health_check` call.
    pub health_check_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_step_timeout: Duration::from_secs(300),
            health_check_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = timeout;
        self
    }

    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }
}
