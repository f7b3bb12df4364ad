//! Model name → controller lookup, populated at startup.

use crate::controller::Controller;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

/// A function contributed by an installed app that registers its controllers.
pub type ControllerModule = fn(&ModelRegistry);

/// Controller modules of one installed app.
#[derive(Clone, Debug)]
pub struct InstalledApp {
    pub label: String,
    pub controllers: Vec<ControllerModule>,
}

impl InstalledApp {
    pub fn new(label: impl Into<String>, controllers: Vec<ControllerModule>) -> Self {
        InstalledApp {
            label: label.into(),
            controllers,
        }
    }
}

#[derive(Default)]
pub struct ModelRegistry {
    controllers: RwLock<HashMap<String, Arc<Controller>>>,
    discovered: AtomicBool,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static ModelRegistry {
        static GLOBAL: OnceLock<ModelRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ModelRegistry::new)
    }

    /// Register `controller` for `model_name`, replacing any previous one.
    pub fn register(&self, model_name: impl Into<String>, controller: Controller) {
        let name = model_name.into();
        tracing::debug!(model = %name, hooks = ?controller.overridden_hooks(), "controller registered");
        let mut map = self.controllers.write().unwrap_or_else(|e| e.into_inner());
        map.insert(name, Arc::new(controller));
    }

    pub fn get(&self, model_name: &str) -> Option<Arc<Controller>> {
        let map = self.controllers.read().unwrap_or_else(|e| e.into_inner());
        map.get(model_name).cloned()
    }

    pub fn is_discovered(&self) -> bool {
        self.discovered.load(Ordering::Acquire)
    }

    /// Run every installed app's controller modules. Only the first call does anything.
    pub fn discover_controllers(&self, apps: &[InstalledApp]) {
        if self.discovered.swap(true, Ordering::AcqRel) {
            return;
        }
        for app in apps {
            tracing::debug!(app = %app.label, modules = app.controllers.len(), "discovering controllers");
            for module in &app.controllers {
                module(self);
            }
        }
    }
}

/// The registered controller for `model_name`, or a controller with only default hooks.
pub fn resolve_controller(registry: &ModelRegistry, model_name: &str) -> Arc<Controller> {
    registry
        .get(model_name)
        .unwrap_or_else(|| Arc::new(Controller::default()))
}
