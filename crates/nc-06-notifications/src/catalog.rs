//! # Module Catalog Port
//!
//! The schema registry is an external collaborator. The pipeline only needs
//! to look modules up by namespace.

use crate::domain::ModuleInfo;
use parking_lot::RwLock;

pub trait ModuleCatalog: Send + Sync {
    fn find_by_namespace(&self, namespace: &str) -> Option<ModuleInfo>;

    fn modules(&self) -> Vec<ModuleInfo>;
}

/// Catalog backed by a vector.
#[derive(Debug, Default)]
pub struct InMemoryModuleCatalog {
    modules: RwLock<Vec<ModuleInfo>>,
}

impl InMemoryModuleCatalog {
    pub fn new(modules: Vec<ModuleInfo>) -> Self {
        Self {
            modules: RwLock::new(modules),
        }
    }

    /// Add a module, replacing any module with the same name.
    pub fn insert(&self, module: ModuleInfo) {
        let mut modules = self.modules.write();
        modules.retain(|m| m.name != module.name);
        modules.push(module);
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut modules = self.modules.write();
        let before = modules.len();
        modules.retain(|m| m.name != name);
        modules.len() != before
    }
}

impl ModuleCatalog for InMemoryModuleCatalog {
    fn find_by_namespace(&self, namespace: &str) -> Option<ModuleInfo> {
        self.modules
            .read()
            .iter()
            .find(|m| m.namespace == namespace)
            .cloned()
    }

    fn modules(&self) -> Vec<ModuleInfo> {
        self.modules.read().clone()
    }
}
