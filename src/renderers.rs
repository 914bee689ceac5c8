use crate::Signal;
use crate::hash::FastHashBuilder;
use indexmap::IndexMap;
use parking_lot::RwLock;

/// Observable mapping from identifier to an externally managed renderer.
///
/// The registry is reactive as a container: reads track it, and every
/// insertion or removal emits right away (no frame batching), so a watcher
/// iterating the registry re-runs at the next flush. What a renderer is, and
/// what it does, is up to the UI layer.
///
/// Shared by `Arc`; external code inserts and removes entries while the
/// editor lives.
pub struct RendererRegistry<R> {
    entries: RwLock<IndexMap<String, R, FastHashBuilder>>,
    signal: Signal,
}

impl<R> RendererRegistry<R> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::default()),
            signal: Signal::new(),
        }
    }

    /// Add or replace the renderer for `id`; returns the replaced one
    pub fn insert(&self, id: impl Into<String>, renderer: R) -> Option<R> {
        let id = id.into();
        tracing::trace!(renderer = %id, "renderer registered");
        let previous = self.entries.write().insert(id, renderer);
        self.signal.emit();
        previous
    }

    /// Remove the renderer for `id`, keeping the order of the others
    pub fn remove(&self, id: &str) -> Option<R> {
        let removed = self.entries.write().shift_remove(id);
        if removed.is_some() {
            tracing::trace!(renderer = %id, "renderer removed");
            self.signal.emit();
        }
        removed
    }

    /// Whether a renderer is registered for `id`
    pub fn contains_key(&self, id: &str) -> bool {
        self.signal.track_dependency();
        self.entries.read().contains_key(id)
    }

    /// Registered identifiers in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.signal.track_dependency();
        self.entries.read().keys().cloned().collect()
    }

    /// Number of registered renderers
    pub fn len(&self) -> usize {
        self.signal.track_dependency();
        self.entries.read().len()
    }

    /// Whether no renderer is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the whole map (tracked). Do not mutate the registry inside `f`.
    pub fn with<T>(&self, f: impl FnOnce(&IndexMap<String, R, FastHashBuilder>) -> T) -> T {
        self.signal.track_dependency();
        f(&self.entries.read())
    }
}

impl<R: Clone> RendererRegistry<R> {
    /// Look up the renderer for `id` (tracked)
    pub fn get(&self, id: &str) -> Option<R> {
        self.signal.track_dependency();
        self.entries.read().get(id).cloned()
    }
}

impl<R> Default for RendererRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Watcher, flush_watchers};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn insert_and_remove_keep_order() {
        let registry = RendererRegistry::new();
        registry.insert("a", 1);
        registry.insert("b", 2);
        registry.insert("c", 3);

        assert_eq!(registry.remove("b"), Some(2));
        assert_eq!(registry.ids(), ["a", "c"]);
        assert_eq!(registry.insert("a", 10), Some(1));
        assert_eq!(registry.get("a"), Some(10));
        assert_eq!(registry.remove("missing"), None);
    }

    #[test]
    fn mutations_rerun_dependents() {
        let registry = Arc::new(RendererRegistry::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let (registry_clone, seen_clone) = (registry.clone(), seen.clone());
        let _watcher = Watcher::new(move || {
            seen_clone.store(registry_clone.len(), Ordering::Relaxed);
        });
        assert_eq!(seen.load(Ordering::Relaxed), 0);

        registry.insert("node-1", "renderer");
        registry.insert("node-2", "renderer");
        flush_watchers();
        assert_eq!(seen.load(Ordering::Relaxed), 2);

        registry.remove("node-1");
        flush_watchers();
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn removing_absent_id_does_not_notify() {
        let registry = Arc::new(RendererRegistry::<u8>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let (registry_clone, runs_clone) = (registry.clone(), runs.clone());
        let _watcher = Watcher::new(move || {
            registry_clone.is_empty();
            runs_clone.fetch_add(1, Ordering::Relaxed);
        });

        registry.remove("nothing-here");
        flush_watchers();

        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }
}
