//! MongoDB client factory and the schema provisioning routines.

use std::time::Duration;

use dnd_schema_kernel::settings::DatabaseSettings;
use dnd_schema_kernel::SchemaError;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential};
use mongodb::Client;
use thiserror::Error;

pub mod provision;
pub mod store;

pub use provision::{provision, verify, IndexMismatch, ProvisionReport, VerifyReport};
pub use store::{
    decode_keys, index_model, CollectionOutcome, IndexDescription, MongoStore, SchemaStore,
};

/// Error returned by the underlying store, kept verbatim as the source.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

const APP_NAME: &str = "dnd-schema";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid MongoDB connection settings")]
    Options(#[source] StoreError),

    #[error("database '{database}' is unreachable")]
    Unreachable {
        database: String,
        #[source]
        source: StoreError,
    },

    #[error("invalid schema")]
    Schema(#[from] SchemaError),

    #[error("failed to create collection '{collection}'")]
    CreateCollection {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to create index '{index}' on '{collection}'")]
    CreateIndex {
        collection: String,
        index: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to inspect '{target}'")]
    Inspect {
        target: String,
        #[source]
        source: StoreError,
    },
}

impl DbError {
    /// Server error code carried by the underlying MongoDB error, if any.
    pub fn server_code(&self) -> Option<i32> {
        let source = match self {
            DbError::Options(source)
            | DbError::Unreachable { source, .. }
            | DbError::CreateCollection { source, .. }
            | DbError::CreateIndex { source, .. }
            | DbError::Inspect { source, .. } => source,
            DbError::Schema(_) => return None,
        };
        source
            .downcast_ref::<mongodb::error::Error>()
            .and_then(store::command_code)
    }
}

/// Build a client from settings and check the database answers a `ping`.
///
/// The driver connects lazily, so the ping is what turns bad hosts and bad
/// credentials into an error before any schema request is sent.
pub async fn connect(settings: &DatabaseSettings) -> Result<MongoStore, DbError> {
    let mut options = ClientOptions::parse(&settings.uri)
        .await
        .map_err(|e| DbError::Options(e.into()))?;

    options.app_name = Some(APP_NAME.to_string());
    options.server_selection_timeout =
        Some(Duration::from_millis(settings.server_selection_timeout_ms));

    if settings.username.is_some() || settings.password.is_some() {
        let mut credential = Credential::default();
        credential.username = settings.username.clone();
        credential.password = settings.password.clone();
        credential.source = settings.auth_source.clone();
        options.credential = Some(credential);
    }

    let client = Client::with_options(options).map_err(|e| DbError::Options(e.into()))?;
    let database = client.database(&settings.name);

    tracing::debug!(database = %settings.name, "pinging MongoDB");
    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| DbError::Unreachable {
            database: settings.name.clone(),
            source: e.into(),
        })?;

    tracing::info!(database = %settings.name, "connected to MongoDB");

    Ok(MongoStore::new(database))
}
