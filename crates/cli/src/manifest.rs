//! Component manifests: a JSON list of `{ "name", "dependencies" }` used to
//! check a deployment's startup order without running any service.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use components::{Component, ComponentError, ComponentRequest, ServiceResponse};
use engine::ComponentRegistry;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Stand-in for a component known only by its manifest entry.
struct DeclaredComponent(ComponentSpec);

#[async_trait]
impl Component for DeclaredComponent {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.0.dependencies.clone()
    }

    async fn initialize(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<ServiceResponse, ComponentError> {
        Ok(ServiceResponse::ok())
    }

    async fn process_request(
        &self,
        _request: ComponentRequest,
    ) -> Result<ServiceResponse, ComponentError> {
        Err(ComponentError::Unavailable(format!(
            "'{}' is a manifest declaration",
            self.0.name
        )))
    }
}

pub fn load(path: &Path) -> anyhow::Result<Vec<ComponentSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read manifest {}", path.display()))?;
    serde_json::from_str(&content).context("invalid component manifest JSON")
}

/// Register every declared component, in file order.
pub fn registry(specs: Vec<ComponentSpec>) -> anyhow::Result<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    for spec in specs {
        registry.register(Arc::new(DeclaredComponent(spec)))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_order_respects_dependencies() {
        let specs: Vec<ComponentSpec> = serde_json::from_str(
            r#"[
                {"name": "api", "dependencies": ["cache", "db"]},
                {"name": "cache", "dependencies": ["db"]},
                {"name": "db"}
            ]"#,
        )
        .unwrap();

        let order = registry(specs).unwrap().get_startup_order().unwrap();
        assert_eq!(order, vec!["db", "cache", "api"]);
    }

    #[test]
    fn duplicate_manifest_entry_is_rejected() {
        let specs = vec![
            ComponentSpec { name: "db".into(), dependencies: vec![] },
            ComponentSpec { name: "db".into(), dependencies: vec![] },
        ];
        assert!(registry(specs).is_err());
    }
}
