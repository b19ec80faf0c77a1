//! Name-to-store registry.
//!
//! The original design reached stores through ambient global state; here
//! the registry is an explicit object created at application startup and
//! handed by reference to every collaborator that resolves store names
//! (replication targets, transports, the CLI).

use dashmap::DashMap;
use std::sync::Arc;

/// Registry mapping store names to store handles.
///
/// Generic over the store type so the data-model crate stays independent
/// of the server crate; in practice `S` is `skiff_store::Store`.
pub struct StoreRegistry<S> {
    stores: DashMap<String, Arc<S>>,
}

impl<S> Default for StoreRegistry<S> {
    fn default() -> Self {
        Self {
            stores: DashMap::new(),
        }
    }
}

impl<S> StoreRegistry<S> {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under a name, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, store: Arc<S>) {
        let name = name.into();
        tracing::debug!("registering store {name:?}");
        self.stores.insert(name, store);
    }

    /// Look up a store by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<S>> {
        self.stores.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a store by name, returning it if present.
    pub fn unregister(&self, name: &str) -> Option<Arc<S>> {
        self.stores.remove(name).map(|(_, store)| store)
    }

    /// Names of all registered stores.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.stores.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let registry: StoreRegistry<String> = StoreRegistry::new();
        assert!(registry.is_empty());

        registry.register("images", Arc::new("images store".to_string()));
        registry.register("backup", Arc::new("backup store".to_string()));

        assert_eq!(registry.len(), 2);
        assert_eq!(*registry.get("images").unwrap(), "images store");
        assert!(registry.get("missing").is_none());

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["backup", "images"]);
    }

    #[test]
    fn reregister_replaces() {
        let registry: StoreRegistry<u32> = StoreRegistry::new();
        registry.register("s", Arc::new(1));
        registry.register("s", Arc::new(2));
        assert_eq!(registry.len(), 1);
        assert_eq!(*registry.get("s").unwrap(), 2);
    }

    #[test]
    fn unregister_removes() {
        let registry: StoreRegistry<u32> = StoreRegistry::new();
        registry.register("s", Arc::new(7));
        assert_eq!(*registry.unregister("s").unwrap(), 7);
        assert!(registry.get("s").is_none());
        assert!(registry.unregister("s").is_none());
    }
}
