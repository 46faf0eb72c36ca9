use dnd_schema_kernel::{CollectionSpec, Module};

pub const RESOURCES_USAGE: &str = "resources_usage";

/// Usage counters for rate-limited resources such as text generation
pub struct ResourcesModule;

impl ResourcesModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Module for ResourcesModule {
    fn name(&self) -> &'static str {
        "resources"
    }

    fn collections(&self) -> Vec<CollectionSpec> {
        vec![CollectionSpec::new(RESOURCES_USAGE)]
    }
}
