//! dnd-schema application library
//!
//! The schema of the dnd bot's MongoDB database, and the entry points that
//! provision and verify it.

pub mod modules;

use anyhow::Context;
use dnd_schema_db::{ProvisionReport, VerifyReport};
use dnd_schema_kernel::settings::Settings;
use dnd_schema_kernel::{CollectionSpec, ModuleRegistry, SchemaError};

/// Registry with every schema module registered
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
}

/// The full validated schema, in creation order
pub fn schema() -> Result<Vec<CollectionSpec>, SchemaError> {
    registry().collect_schema()
}

/// Connect with `settings` and ensure the schema exists
pub async fn provision(settings: &Settings) -> anyhow::Result<ProvisionReport> {
    let schema = schema().context("schema definition is invalid")?;
    let store = dnd_schema_db::connect(&settings.database)
        .await
        .with_context(|| format!("failed to connect to database '{}'", settings.database.name))?;

    dnd_schema_db::provision(&store, &schema)
        .await
        .context("schema provisioning failed")
}

/// Connect with `settings` and compare the database against the schema
pub async fn verify(settings: &Settings) -> anyhow::Result<VerifyReport> {
    let schema = schema().context("schema definition is invalid")?;
    let store = dnd_schema_db::connect(&settings.database)
        .await
        .with_context(|| format!("failed to connect to database '{}'", settings.database.name))?;

    dnd_schema_db::verify(&store, &schema)
        .await
        .context("schema verification failed")
}
