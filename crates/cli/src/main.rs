use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use dnd_schema_kernel::settings::Settings;
use dnd_schema_kernel::{CollectionSpec, IndexKey};

/// Provision and inspect the dnd bot's MongoDB schema
#[derive(Debug, Parser)]
#[command(name = "dnd-schema-cli", version, about)]
struct Cli {
    /// MongoDB connection string, overriding `database.uri`
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Database name, overriding `database.name`
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create missing collections and indexes (default)
    Provision,
    /// Compare the database with the declared schema
    Verify,
    /// Print the declared schema without connecting
    Plan {
        #[arg(long, value_enum, default_value_t = PlanFormat::Text)]
        format: PlanFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlanFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Provision);

    // Printing the schema needs neither settings nor a connection.
    if let Command::Plan { format } = command {
        return plan(format);
    }

    let mut settings = Settings::load().with_context(|| "failed to load dnd-schema settings")?;
    if let Some(uri) = cli.uri {
        settings.database.uri = uri;
    }
    if let Some(database) = cli.database {
        settings.database.name = database;
    }

    dnd_schema_telemetry::init(&settings.telemetry)?;

    tracing::debug!(?command, database = %settings.database.name, "running command");

    match command {
        Command::Provision => runtime()?.block_on(provision(&settings)),
        Command::Verify => runtime()?.block_on(verify(&settings)),
        Command::Plan { format } => plan(format),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}

fn plan(format: PlanFormat) -> anyhow::Result<()> {
    let schema = dnd_schema::schema().context("schema definition is invalid")?;

    match format {
        PlanFormat::Json => {
            let json = serde_json::to_string_pretty(&schema).context("failed to render schema")?;
            println!("{json}");
        }
        PlanFormat::Text => print!("{}", render_plan(&schema)),
    }

    Ok(())
}

fn render_plan(schema: &[CollectionSpec]) -> String {
    let mut out = String::new();
    for collection in schema {
        out.push_str(&format!("create collection {}\n", collection.name));
        for index in &collection.indexes {
            out.push_str(&format!(
                "create index {}.{} {} unique={}\n",
                collection.name,
                index.store_name(),
                render_keys(&index.keys),
                index.unique
            ));
        }
    }
    out
}

fn render_keys(keys: &[(String, IndexKey)]) -> String {
    let keys = keys
        .iter()
        .map(|(field, key)| format!("{field}: {key}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{keys}}}")
}

async fn provision(settings: &Settings) -> anyhow::Result<()> {
    let report = dnd_schema::provision(settings).await?;

    for name in &report.created_collections {
        println!("created collection {name}");
    }
    for name in &report.existing_collections {
        println!("collection {name} already exists");
    }
    for name in &report.ensured_indexes {
        println!("ensured index {name}");
    }

    Ok(())
}

async fn verify(settings: &Settings) -> anyhow::Result<()> {
    let report = dnd_schema::verify(settings).await?;

    if report.is_clean() {
        println!("schema of '{}' is up to date", settings.database.name);
        return Ok(());
    }

    for name in &report.missing_collections {
        println!("missing collection {name}");
    }
    for name in &report.missing_indexes {
        println!("missing index {name}");
    }
    for mismatch in &report.mismatched_indexes {
        println!(
            "index {}.{} is {} unique={} but {} unique={} is declared",
            mismatch.collection,
            mismatch.index,
            render_keys(&mismatch.actual_keys),
            mismatch.actual_unique,
            render_keys(&mismatch.expected_keys),
            mismatch.expected_unique
        );
    }

    bail!("schema of '{}' is out of date", settings.database.name)
}
