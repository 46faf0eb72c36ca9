use std::sync::Arc;

use crate::module::Module;
use crate::schema::{validate_schema, CollectionSpec, SchemaError};

/// Module registry holding the schema contributors in registration order
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module with the registry
    pub fn register(&mut self, module: Arc<dyn Module>) {
        tracing::debug!(module = module.name(), "registering schema module");
        self.modules.push(module);
    }

    /// Get all registered modules
    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    /// Get a module by name
    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.iter().find(|module| module.name() == name)
    }

    /// Get the number of registered modules
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Collect the collections of every module and validate the combined schema
    ///
    /// Unlike migrations, collections are not sorted: registration order is
    /// the order in which they are created.
    pub fn collect_schema(&self) -> Result<Vec<CollectionSpec>, SchemaError> {
        let collections: Vec<CollectionSpec> = self
            .modules
            .iter()
            .flat_map(|module| module.collections())
            .collect();

        validate_schema(&collections)?;

        Ok(collections)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
