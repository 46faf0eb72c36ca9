pub mod alchemy;
pub mod casino;
pub mod npc;
pub mod resources;

use std::sync::Arc;

use dnd_schema_kernel::ModuleRegistry;

/// Register all schema modules with the registry
///
/// Order matters: it is the order collections are created in.
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register(Arc::new(alchemy::AlchemyModule::new()));
    registry.register(Arc::new(npc::NpcModule::new()));
    registry.register(Arc::new(resources::ResourcesModule::new()));
    registry.register(Arc::new(casino::CasinoModule::new()));
}
