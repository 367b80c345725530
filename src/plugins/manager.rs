//! Plugin manager - handles plugin lifecycle and the command index

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::application::errors::{PluginError, PluginResult};
use crate::application::messaging::filters;
use crate::domain::entities::{CommandIndex, CommandMetadata};
use crate::domain::traits::{EventDispatcher, HandlerToken, Predicate};
use super::registry::PluginCatalog;
use super::trait_def::{HandlerDescriptor, PluginContext, PluginScope};

/// Lifecycle state of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

/// Handlers a loaded module currently owns on the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub module_id: String,
    pub handlers: Vec<HandlerToken>,
}

/// Outcome of a bulk load
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl LoadSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = format!("Loaded {} plugin(s)", self.loaded.len());
        if !self.failed.is_empty() {
            out.push_str(&format!(", {} failed:", self.failed.len()));
            for (id, reason) in &self.failed {
                out.push_str(&format!("\n- {}: {}", id, reason));
            }
        }
        out
    }
}

#[derive(Default)]
struct Registry {
    descriptors: HashMap<String, PluginDescriptor>,
    states: HashMap<String, PluginState>,
    index: CommandIndex,
}

/// Manages plugin loading, unloading and reloading against a dispatcher
pub struct PluginManager {
    dispatcher: Arc<dyn EventDispatcher>,
    catalog: Arc<PluginCatalog>,
    context: Arc<PluginContext>,
    /// Held for the whole of every lifecycle operation
    registry: Mutex<Registry>,
}

impl PluginManager {
    pub fn new(
        dispatcher: Arc<dyn EventDispatcher>,
        catalog: Arc<PluginCatalog>,
        context: Arc<PluginContext>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            dispatcher,
            catalog,
            context: context.clone(),
            registry: Mutex::new(Registry::default()),
        });
        context.attach(Arc::downgrade(&manager));
        manager
    }

    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a module, reloading it if it is already loaded
    pub fn load(&self, module_id: &str) -> bool {
        self.try_load(module_id).is_ok()
    }

    /// Like [`load`](Self::load) but returns the failure reason
    pub fn try_load(&self, module_id: &str) -> PluginResult<usize> {
        let mut registry = self.registry();
        self.load_locked(&mut registry, module_id)
    }

    /// Returns false when the module was not loaded
    pub fn unload(&self, module_id: &str) -> bool {
        let mut registry = self.registry();
        self.unload_locked(&mut registry, module_id)
    }

    pub fn reload(&self, module_id: &str) -> bool {
        let mut registry = self.registry();
        self.unload_locked(&mut registry, module_id);
        self.load_locked(&mut registry, module_id).is_ok()
    }

    /// Load every enabled unit in the catalog
    pub fn load_all(&self) -> LoadSummary {
        let mut registry = self.registry();
        self.load_discovered(&mut registry)
    }

    /// Unload everything, drop the command index, then load every enabled unit
    pub fn reload_all(&self) -> LoadSummary {
        let mut registry = self.registry();

        let mut loaded: Vec<String> = registry.descriptors.keys().cloned().collect();
        loaded.sort();
        for module_id in &loaded {
            self.unload_locked(&mut registry, module_id);
        }
        registry.index.clear();

        let summary = self.load_discovered(&mut registry);
        info!("Reloaded plugins: {}", summary.render());
        summary
    }

    fn load_discovered(&self, registry: &mut Registry) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for module_id in self.catalog.discover() {
            match self.load_locked(registry, &module_id) {
                Ok(_) => summary.loaded.push(module_id),
                Err(e) => summary.failed.push((module_id, e.to_string())),
            }
        }
        summary
    }

    fn load_locked(&self, registry: &mut Registry, module_id: &str) -> PluginResult<usize> {
        if registry.descriptors.contains_key(module_id) {
            debug!("Plugin {} already loaded, reloading", module_id);
            self.unload_locked(registry, module_id);
        }

        registry.states.insert(module_id.to_string(), PluginState::Loading);

        match self.register_module(module_id) {
            Ok((tokens, entries)) => {
                for entry in entries {
                    if let Some(previous) = registry.index.upsert(entry) {
                        if previous.module_id != module_id {
                            debug!(
                                "Command {} moved from {} to {}",
                                previous.name, previous.module_id, module_id
                            );
                        }
                    }
                }
                let count = tokens.len();
                registry.descriptors.insert(
                    module_id.to_string(),
                    PluginDescriptor {
                        module_id: module_id.to_string(),
                        handlers: tokens,
                    },
                );
                registry.states.insert(module_id.to_string(), PluginState::Loaded);
                info!("Loaded plugin: {} ({} handlers)", module_id, count);
                Ok(count)
            }
            Err(e) => {
                registry.index.remove_module(module_id);
                registry.states.insert(module_id.to_string(), PluginState::Unloaded);
                error!("Failed to load plugin {}: {}", module_id, e);
                Err(e)
            }
        }
    }

    /// Run the unit's registration and attach every handler it declares.
    /// Tokens attached before a failure are released again.
    fn register_module(&self, module_id: &str) -> PluginResult<(Vec<HandlerToken>, Vec<CommandMetadata>)> {
        let plugin = self
            .catalog
            .get(module_id)
            .ok_or_else(|| PluginError::NotFound(module_id.to_string()))?;

        let mut scope = PluginScope::new(module_id, self.context.clone());
        plugin.register(&mut scope)?;

        let mut tokens = Vec::new();
        let mut entries = Vec::new();
        for descriptor in scope.into_descriptors() {
            let predicate = self.compose(&descriptor);
            match self.dispatcher.on(descriptor.kind, predicate, descriptor.callback) {
                Ok(token) => tokens.push(token),
                Err(e) => {
                    self.release(module_id, &tokens);
                    return Err(PluginError::Registration(format!("{}: {}", module_id, e)));
                }
            }
            if let Some(metadata) = descriptor.metadata {
                entries.push(metadata);
            }
        }

        Ok((tokens, entries))
    }

    /// Own predicate, then the boot-time filter, then authorization for commands
    fn compose(&self, descriptor: &HandlerDescriptor) -> Predicate {
        let mut parts = vec![
            descriptor.predicate.clone(),
            filters::boot_filter(self.context.boot_time),
        ];
        if let Some(metadata) = &descriptor.metadata {
            parts.push(filters::access_filter(
                metadata.access_level(),
                self.context.config.bot.owner_id.clone(),
                self.context.state.clone(),
            ));
        }
        filters::all_of(parts)
    }

    /// Deregister tokens; individual failures are logged and skipped
    fn release(&self, module_id: &str, tokens: &[HandlerToken]) -> usize {
        let mut released = 0;
        for token in tokens {
            match self.dispatcher.off(*token) {
                Ok(()) => released += 1,
                Err(e) => warn!("Failed to remove handler {} of {}: {}", token, module_id, e),
            }
        }
        released
    }

    fn unload_locked(&self, registry: &mut Registry, module_id: &str) -> bool {
        let Some(descriptor) = registry.descriptors.remove(module_id) else {
            return false;
        };

        registry.states.insert(module_id.to_string(), PluginState::Unloading);
        let released = self.release(module_id, &descriptor.handlers);
        let commands = registry.index.remove_module(module_id);
        registry.states.insert(module_id.to_string(), PluginState::Unloaded);

        info!(
            "Unloaded plugin: {} ({}/{} handlers, {} commands)",
            module_id,
            released,
            descriptor.handlers.len(),
            commands
        );
        true
    }

    pub fn state(&self, module_id: &str) -> PluginState {
        self.registry()
            .states
            .get(module_id)
            .copied()
            .unwrap_or(PluginState::Unloaded)
    }

    pub fn is_loaded(&self, module_id: &str) -> bool {
        self.registry().descriptors.contains_key(module_id)
    }

    /// Sorted ids of loaded modules
    pub fn loaded_modules(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry().descriptors.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn descriptor(&self, module_id: &str) -> Option<PluginDescriptor> {
        self.registry().descriptors.get(module_id).cloned()
    }

    pub fn commands(&self) -> Vec<CommandMetadata> {
        self.registry().index.all().cloned().collect()
    }

    /// Look up a command by name or alias
    pub fn command(&self, name: &str) -> Option<CommandMetadata> {
        self.registry().index.find(name).cloned()
    }

    pub fn commands_by_category(&self) -> BTreeMap<String, Vec<CommandMetadata>> {
        self.registry().index.by_category()
    }
}
