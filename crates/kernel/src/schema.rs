//! Declarative description of the collections and indexes the provisioner manages.

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Sort direction or mode of a single indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Ascending,
    Descending,
    Text,
}

impl IndexKey {
    pub fn is_text(self) -> bool {
        matches!(self, IndexKey::Text)
    }
}

/// Renders the key the way MongoDB spells it in key documents and index names.
impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Ascending => f.write_str("1"),
            IndexKey::Descending => f.write_str("-1"),
            IndexKey::Text => f.write_str("text"),
        }
    }
}

impl Serialize for IndexKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IndexKey::Ascending => serializer.serialize_i32(1),
            IndexKey::Descending => serializer.serialize_i32(-1),
            IndexKey::Text => serializer.serialize_str("text"),
        }
    }
}

/// An index on one collection: ordered key mapping plus uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    pub keys: Vec<(String, IndexKey)>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            unique: false,
        }
    }

    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexKey::Ascending));
        self
    }

    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexKey::Descending));
        self
    }

    pub fn text(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexKey::Text));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn has_text_key(&self) -> bool {
        self.keys.iter().any(|(_, key)| key.is_text())
    }

    /// The name MongoDB assigns when none is given, e.g. `name_1_user_1`.
    ///
    /// Indexes are created under this name so that databases initialized by
    /// hand with the shell get the same index names.
    pub fn store_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, key)| format!("{field}_{key}"))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// A named collection and the indexes declared on it, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSpec {
    pub name: String,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("collection name must not be empty")]
    EmptyCollectionName,

    #[error("collection '{0}' is declared more than once")]
    DuplicateCollection(String),

    #[error("index on '{collection}' declares no keys")]
    EmptyIndex { collection: String },

    #[error("index '{index}' on '{collection}' lists field '{field}' more than once")]
    DuplicateField {
        collection: String,
        index: String,
        field: String,
    },

    #[error("index '{index}' is declared more than once on '{collection}'")]
    DuplicateIndex { collection: String, index: String },

    #[error("collection '{collection}' declares more than one text index")]
    MultipleTextIndexes { collection: String },

    #[error("unique index '{index}' on '{collection}' contains a text key")]
    UniqueTextIndex { collection: String, index: String },
}

/// Check the invariants every schema must hold before any request is issued.
pub fn validate_schema(collections: &[CollectionSpec]) -> Result<(), SchemaError> {
    let mut names = HashSet::new();

    for collection in collections {
        if collection.name.is_empty() {
            return Err(SchemaError::EmptyCollectionName);
        }
        if !names.insert(collection.name.as_str()) {
            return Err(SchemaError::DuplicateCollection(collection.name.clone()));
        }
        validate_indexes(collection)?;
    }

    Ok(())
}

fn validate_indexes(collection: &CollectionSpec) -> Result<(), SchemaError> {
    let mut seen_keys: Vec<&[(String, IndexKey)]> = Vec::new();
    let mut text_indexes = 0;

    for index in &collection.indexes {
        if index.keys.is_empty() {
            return Err(SchemaError::EmptyIndex {
                collection: collection.name.clone(),
            });
        }

        let mut fields = HashSet::new();
        for (field, _) in &index.keys {
            if !fields.insert(field.as_str()) {
                return Err(SchemaError::DuplicateField {
                    collection: collection.name.clone(),
                    index: index.store_name(),
                    field: field.clone(),
                });
            }
        }

        if seen_keys.contains(&index.keys.as_slice()) {
            return Err(SchemaError::DuplicateIndex {
                collection: collection.name.clone(),
                index: index.store_name(),
            });
        }
        seen_keys.push(&index.keys);

        if index.has_text_key() {
            if index.unique {
                return Err(SchemaError::UniqueTextIndex {
                    collection: collection.name.clone(),
                    index: index.store_name(),
                });
            }
            text_indexes += 1;
            if text_indexes > 1 {
                return Err(SchemaError::MultipleTextIndexes {
                    collection: collection.name.clone(),
                });
            }
        }
    }

    Ok(())
}
