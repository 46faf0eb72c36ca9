//! The seam between the provisioner and the document store.

use async_trait::async_trait;
use dnd_schema_kernel::{IndexKey, IndexSpec};
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};

use crate::DbError;

/// `createCollection` answer when the namespace is already taken.
const NAMESPACE_EXISTS: i32 = 48;

/// Result of a create-if-absent collection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOutcome {
    Created,
    AlreadyExists,
}

/// An index as reported back by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    pub name: String,
    pub keys: Vec<(String, IndexKey)>,
    pub unique: bool,
}

/// Schema primitives the provisioner needs from a store.
///
/// Both create calls must be idempotent on the store side: creating something
/// that already exists is a success, never a check-then-create.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    fn database_name(&self) -> &str;

    async fn create_collection(&self, name: &str) -> Result<CollectionOutcome, DbError>;

    /// Returns the name the store gave the index.
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String, DbError>;

    async fn collection_names(&self) -> Result<Vec<String>, DbError>;

    /// Indexes of `collection`; kinds other than ascending, descending and
    /// text (hashed, geo, ...) are left out.
    async fn indexes(&self, collection: &str) -> Result<Vec<IndexDescription>, DbError>;
}

/// [`SchemaStore`] backed by a MongoDB database handle.
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl SchemaStore for MongoStore {
    fn database_name(&self) -> &str {
        self.database.name()
    }

    async fn create_collection(&self, name: &str) -> Result<CollectionOutcome, DbError> {
        match self.database.create_collection(name).await {
            Ok(()) => Ok(CollectionOutcome::Created),
            Err(e) if command_code(&e) == Some(NAMESPACE_EXISTS) => {
                Ok(CollectionOutcome::AlreadyExists)
            }
            Err(e) => Err(DbError::CreateCollection {
                collection: name.to_string(),
                source: e.into(),
            }),
        }
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String, DbError> {
        let result = self
            .database
            .collection::<Document>(collection)
            .create_index(index_model(index))
            .await
            .map_err(|e| DbError::CreateIndex {
                collection: collection.to_string(),
                index: index.store_name(),
                source: e.into(),
            })?;

        Ok(result.index_name)
    }

    async fn collection_names(&self) -> Result<Vec<String>, DbError> {
        self.database
            .list_collection_names()
            .await
            .map_err(|e| DbError::Inspect {
                target: self.database.name().to_string(),
                source: e.into(),
            })
    }

    async fn indexes(&self, collection: &str) -> Result<Vec<IndexDescription>, DbError> {
        let inspect_err = |e: mongodb::error::Error| DbError::Inspect {
            target: collection.to_string(),
            source: e.into(),
        };

        let models: Vec<IndexModel> = self
            .database
            .collection::<Document>(collection)
            .list_indexes()
            .await
            .map_err(inspect_err)?
            .try_collect()
            .await
            .map_err(inspect_err)?;

        Ok(models
            .into_iter()
            .filter_map(|model| {
                let options = model.options?;
                Some(IndexDescription {
                    keys: decode_keys(&model.keys, options.weights.as_ref())?,
                    name: options.name?,
                    unique: options.unique.unwrap_or(false),
                })
            })
            .collect())
    }
}

/// Translate an [`IndexSpec`] into the driver's index model.
///
/// `unique` is only sent when set, so the non-unique definition matches an
/// index created without options.
pub fn index_model(index: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for (field, key) in &index.keys {
        let value = match key {
            IndexKey::Ascending => Bson::Int32(1),
            IndexKey::Descending => Bson::Int32(-1),
            IndexKey::Text => Bson::String("text".to_string()),
        };
        keys.insert(field.clone(), value);
    }

    let mut options = IndexOptions::builder().name(index.store_name()).build();
    if index.unique {
        options.unique = Some(true);
    }

    IndexModel::builder().keys(keys).options(options).build()
}

/// Read a key document back into key mappings.
///
/// The server stores text indexes as `{_fts: "text", _ftsx: 1}` and lists the
/// text fields in `weights`, so those are expanded in place of `_fts`.
pub fn decode_keys(
    keys: &Document,
    weights: Option<&Document>,
) -> Option<Vec<(String, IndexKey)>> {
    let mut decoded = Vec::with_capacity(keys.len());

    for (field, value) in keys {
        match field.as_str() {
            "_fts" => decoded.extend(
                weights?
                    .keys()
                    .map(|text_field| (text_field.clone(), IndexKey::Text)),
            ),
            "_ftsx" => {}
            _ => {
                let key = match value {
                    Bson::Int32(direction) => direction_key(f64::from(*direction)),
                    Bson::Int64(direction) => direction_key(*direction as f64),
                    Bson::Double(direction) => direction_key(*direction),
                    Bson::String(kind) if kind == "text" => Some(IndexKey::Text),
                    _ => None,
                }?;
                decoded.push((field.clone(), key));
            }
        }
    }

    Some(decoded)
}

fn direction_key(direction: f64) -> Option<IndexKey> {
    if direction > 0.0 {
        Some(IndexKey::Ascending)
    } else if direction < 0.0 {
        Some(IndexKey::Descending)
    } else {
        None
    }
}

/// Server code of a command error, e.g. 48 or 11000.
pub(crate) fn command_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}
