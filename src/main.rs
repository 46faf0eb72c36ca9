use anyhow::Context;
use dnd_schema_kernel::settings::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load dnd-schema settings")?;

    dnd_schema_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.database.name,
        "dnd-schema bootstrap starting"
    );

    let report = dnd_schema::provision(&settings).await?;

    tracing::info!(
        created = report.created_collections.len(),
        existing = report.existing_collections.len(),
        indexes = report.ensured_indexes.len(),
        "dnd-schema bootstrap complete"
    );
    Ok(())
}
