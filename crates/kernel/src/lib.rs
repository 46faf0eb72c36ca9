//! Schema model, module registry, and settings shared by the dnd-schema crates.

pub mod module;
pub mod registry;
pub mod schema;
pub mod settings;

pub use module::Module;
pub use registry::ModuleRegistry;
pub use schema::{validate_schema, CollectionSpec, IndexKey, IndexSpec, SchemaError};
