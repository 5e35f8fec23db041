//! Application context: the bus and registry an application shares

use std::sync::Arc;

use crate::action::Action;
use crate::bus::ActionBus;
use crate::controller::Controller;
use crate::registry::ControllerRegistry;

/// One bus plus the registry of controllers attached to it
#[derive(Clone, Debug)]
pub struct AppContext {
    bus: ActionBus,
    registry: ControllerRegistry,
}

impl AppContext {
    pub fn new() -> Self {
        let bus = ActionBus::new();
        let registry = ControllerRegistry::new(&bus);
        Self { bus, registry }
    }

    pub fn bus(&self) -> &ActionBus {
        &self.bus
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// Shorthand for [`ControllerRegistry::get_or_create`]
    pub fn get<C: Controller>(&self) -> Arc<C> {
        self.registry.get_or_create::<C>()
    }

    /// Shorthand for [`ControllerRegistry::remove`]
    pub fn remove<C: Controller>(&self) -> bool {
        self.registry.remove::<C>()
    }

    pub fn dispatch(&self, action: impl Into<Action>) {
        self.bus.dispatch(action);
    }

    /// Dispose every registered controller
    pub fn shutdown(&self) -> usize {
        let count = self.registry.clear();
        tracing::info!(target: "statebus", controllers = count, "context shut down");
        count
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}
