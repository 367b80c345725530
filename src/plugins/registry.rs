//! Plugin catalog - The set of plugin units available for loading

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use super::trait_def::Plugin;

/// Catalog of plugin units, consulted on every discovery
pub struct PluginCatalog {
    units: RwLock<BTreeMap<String, Arc<dyn Plugin>>>,
    disabled: RwLock<BTreeSet<String>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(BTreeMap::new()),
            disabled: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn with_disabled<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.disabled.write().unwrap_or_else(PoisonError::into_inner) =
            ids.into_iter().map(Into::into).collect();
        self
    }

    /// Add a unit, returning the one it replaced
    pub fn add<P: Plugin + 'static>(&self, plugin: P) -> Option<Arc<dyn Plugin>> {
        self.add_arc(Arc::new(plugin))
    }

    pub fn add_arc(&self, plugin: Arc<dyn Plugin>) -> Option<Arc<dyn Plugin>> {
        let id = plugin.module_id().to_string();
        tracing::debug!("Plugin unit available: {}", id);
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, plugin)
    }

    pub fn remove(&self, module_id: &str) -> Option<Arc<dyn Plugin>> {
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(module_id)
    }

    pub fn get(&self, module_id: &str) -> Option<Arc<dyn Plugin>> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module_id)
            .cloned()
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.get(module_id).is_some()
    }

    pub fn set_disabled(&self, module_id: &str, disabled: bool) {
        let mut set = self.disabled.write().unwrap_or_else(PoisonError::into_inner);
        if disabled {
            set.insert(module_id.to_string());
        } else {
            set.remove(module_id);
        }
    }

    /// Ids of every enabled unit, sorted
    pub fn discover(&self) -> Vec<String> {
        let disabled = self.disabled.read().unwrap_or_else(PoisonError::into_inner);
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|id| !disabled.contains(*id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::PluginResult;
    use crate::plugins::trait_def::PluginScope;

    struct Named(&'static str);

    impl Plugin for Named {
        fn module_id(&self) -> &str {
            self.0
        }

        fn register(&self, _scope: &mut PluginScope) -> PluginResult<()> {
            Ok(())
        }
    }

    #[test]
    fn discover_skips_disabled_units() {
        let catalog = PluginCatalog::new().with_disabled(["b"]);
        catalog.add(Named("c"));
        catalog.add(Named("a"));
        catalog.add(Named("b"));
        assert_eq!(catalog.discover(), vec!["a".to_string(), "c".to_string()]);

        catalog.set_disabled("b", false);
        assert_eq!(catalog.discover().len(), 3);
    }

    #[test]
    fn add_replaces_same_id() {
        let catalog = PluginCatalog::new();
        assert!(catalog.add(Named("a")).is_none());
        assert!(catalog.add(Named("a")).is_some());
        assert_eq!(catalog.len(), 1);
        assert!(catalog.remove("a").is_some());
        assert!(catalog.is_empty());
    }
}
