//! Function registry for looking up metadata by name.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use nimbus_core::FunctionMeta;
use parking_lot::RwLock;

/// Thread-safe catalog of invocable functions.
///
/// Entries are shared as `Arc<FunctionMeta>` and never mutated: replacing a
/// function registers a new value under the same name. No validation happens
/// here; the loader only registers what the worker reported.
///
/// # Examples
///
/// ```rust,ignore
/// use nimbus_runtime::FunctionRegistry;
///
/// let registry = FunctionRegistry::new();
/// registry.register(FunctionMeta::new("double", "/fns/double.ts"));
/// let meta = registry.get("double").unwrap();
/// ```
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<FunctionMeta>>>,
}

impl FunctionRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the previous entry under the same name.
    pub fn register(&self, meta: impl Into<Arc<FunctionMeta>>) -> Option<Arc<FunctionMeta>> {
        let meta = meta.into();
        tracing::debug!(function = %meta.name, path = %meta.file_path.display(), "registered function");
        self.functions.write().insert(meta.name.clone(), meta)
    }

    /// Look up a function by name.
    pub fn get(&self, name: &str) -> Option<Arc<FunctionMeta>> {
        self.functions.read().get(name).cloned()
    }

    /// Snapshot of every entry, sorted by name.
    pub fn all(&self) -> Vec<Arc<FunctionMeta>> {
        let mut all: Vec<_> = self.functions.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Remove a function by name. Returns the removed entry, if any.
    pub fn unregister(&self, name: &str) -> Option<Arc<FunctionMeta>> {
        self.functions.write().remove(name)
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.functions.write().clear();
    }

    /// Check if a function is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// The entry loaded from `path`, whatever its name.
    pub fn find_by_path(&self, path: &Path) -> Option<Arc<FunctionMeta>> {
        self.functions
            .read()
            .values()
            .find(|meta| meta.is_backed_by(path))
            .cloned()
    }
}
