//! `ComponentRegistry` — owns the registered components and their
//! engine-tracked status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use components::{Component, ComponentStatus};
use tracing::debug;

use crate::dag::topological_order;
use crate::EngineError;

/// A registered component together with the status the engine tracks for it.
pub struct ManagedComponent {
    component: Arc<dyn Component>,
    dependencies: Vec<String>,
    status: Mutex<ComponentStatus>,
}

impl ManagedComponent {
    fn new(component: Arc<dyn Component>) -> Self {
        let dependencies = component.dependencies();
        Self {
            component,
            dependencies,
            status: Mutex::new(ComponentStatus::Created),
        }
    }

    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    pub fn status(&self) -> ComponentStatus {
        *self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn set_status(&self, status: ComponentStatus) {
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }
}

/// Name → component map plus registration order.
///
/// Dependencies are captured once at registration time.
#[derive(Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<ManagedComponent>>,
    registration_order: Vec<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component under its `name()`.
    ///
    /// # Errors
    /// [`EngineError::Configuration`] if the name is already taken.
    pub fn register(&mut self, component: Arc<dyn Component>) -> Result<(), EngineError> {
        let name = component.name().to_owned();
        if self.components.contains_key(&name) {
            return Err(EngineError::configuration(format!(
                "component '{name}' is already registered"
            )));
        }
        debug!(component = %name, "registering component");
        self.components
            .insert(name.clone(), Arc::new(ManagedComponent::new(component)));
        self.registration_order.push(name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(name).map(|m| Arc::clone(&m.component))
    }

    pub fn get_all(&self) -> HashMap<String, Arc<dyn Component>> {
        self.components
            .iter()
            .map(|(name, m)| (name.clone(), Arc::clone(&m.component)))
            .collect()
    }

    pub(crate) fn managed(&self, name: &str) -> Option<Arc<ManagedComponent>> {
        self.components.get(name).cloned()
    }

    pub fn status(&self, name: &str) -> Option<ComponentStatus> {
        self.components.get(name).map(|m| m.status())
    }

    /// Names in registration order.
    pub fn names(&self) -> &[String] {
        &self.registration_order
    }

    pub fn len(&self) -> usize {
        self.registration_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registration_order.is_empty()
    }

    /// Names ordered so that each component follows all its dependencies.
    /// Ties are broken by registration order.
    ///
    /// # Errors
    /// - [`EngineError::Cycle`] on a circular dependency.
    /// - [`EngineError::Configuration`] if a dependency is not registered.
    pub fn get_startup_order(&self) -> Result<Vec<String>, EngineError> {
        let graph: Vec<(&str, Vec<&str>)> = self
            .registration_order
            .iter()
            .map(|name| {
                let deps = self.components[name].dependencies.iter().map(String::as_str);
                (name.as_str(), deps.collect())
            })
            .collect();
        topological_order(&graph, "component")
    }
}
