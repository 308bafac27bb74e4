//! Registry of available resources.
//!
//! One manager is created at startup and shared (behind `Arc`) with the
//! HTTP layer and every MCP session. Registration order does not matter;
//! listings are sorted by code.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{DynResource, Resource};

/// Map of resource code to resource.
#[derive(Default)]
pub struct ResourceManager {
    resources: RwLock<HashMap<String, Arc<dyn DynResource>>>,
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("codes", &self.codes())
            .finish()
    }
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource under its own code, replacing any previous one.
    pub fn register_resource<R: Resource>(&self, resource: R) -> Option<Arc<dyn DynResource>> {
        self.register_shared(Arc::new(resource))
    }

    /// Register an already shared resource.
    pub fn register_shared(&self, resource: Arc<dyn DynResource>) -> Option<Arc<dyn DynResource>> {
        let code = resource.code().to_string();
        let previous = self.resources.write().insert(code.clone(), resource);
        if previous.is_some() {
            tracing::debug!(resource = %code, "Replaced registered resource");
        } else {
            tracing::debug!(resource = %code, "Registered resource");
        }
        previous
    }

    pub fn unregister_resource(&self, code: &str) -> Option<Arc<dyn DynResource>> {
        let removed = self.resources.write().remove(code);
        if removed.is_some() {
            tracing::debug!(resource = %code, "Unregistered resource");
        }
        removed
    }

    pub fn get_resource(&self, code: &str) -> Option<Arc<dyn DynResource>> {
        self.resources.read().get(code).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.resources.read().contains_key(code)
    }

    /// All resources, sorted by code.
    pub fn list(&self) -> Vec<Arc<dyn DynResource>> {
        let mut resources: Vec<_> = self.resources.read().values().cloned().collect();
        resources.sort_by(|a, b| a.code().cmp(b.code()));
        resources
    }

    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.resources.read().keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    pub fn clear(&self) {
        self.resources.write().clear();
    }
}
