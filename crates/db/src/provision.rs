//! Provisioning and read-back verification of the declared schema.

use std::collections::HashSet;

use dnd_schema_kernel::{validate_schema, CollectionSpec, IndexKey};

use crate::store::{CollectionOutcome, SchemaStore};
use crate::DbError;

/// What a provisioning run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created_collections: Vec<String>,
    pub existing_collections: Vec<String>,
    /// `collection.index` for every index request that succeeded
    pub ensured_indexes: Vec<String>,
}

/// Ensure every collection and index in `schema` exists.
///
/// Requests go out one at a time, in schema order, each collection before its
/// indexes. The first failure aborts the run; nothing already created is
/// rolled back.
pub async fn provision<S>(store: &S, schema: &[CollectionSpec]) -> Result<ProvisionReport, DbError>
where
    S: SchemaStore + ?Sized,
{
    validate_schema(schema)?;

    let database = store.database_name();
    tracing::info!(database, "start initializing");

    let mut report = ProvisionReport::default();

    for collection in schema {
        match store.create_collection(&collection.name).await? {
            CollectionOutcome::Created => {
                tracing::info!(collection = %collection.name, "collection created");
                report.created_collections.push(collection.name.clone());
            }
            CollectionOutcome::AlreadyExists => {
                tracing::debug!(collection = %collection.name, "collection already exists");
                report.existing_collections.push(collection.name.clone());
            }
        }

        for index in &collection.indexes {
            let name = store.create_index(&collection.name, index).await?;
            tracing::info!(
                collection = %collection.name,
                index = %name,
                unique = index.unique,
                "index ensured"
            );
            report
                .ensured_indexes
                .push(format!("{}.{}", collection.name, name));
        }
    }

    tracing::info!(
        database,
        created = report.created_collections.len(),
        existing = report.existing_collections.len(),
        indexes = report.ensured_indexes.len(),
        "finished initializing"
    );

    Ok(report)
}

/// An index present under the declared name but with other keys or uniqueness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMismatch {
    pub collection: String,
    pub index: String,
    pub expected_keys: Vec<(String, IndexKey)>,
    pub actual_keys: Vec<(String, IndexKey)>,
    pub expected_unique: bool,
    pub actual_unique: bool,
}

/// Differences between the declared schema and what the store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub missing_collections: Vec<String>,
    /// `collection.index`
    pub missing_indexes: Vec<String>,
    pub mismatched_indexes: Vec<IndexMismatch>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing_collections.is_empty()
            && self.missing_indexes.is_empty()
            && self.mismatched_indexes.is_empty()
    }
}

/// Read the schema back from the store and compare it with `schema`.
///
/// Indexes are matched by store name, then compared by key mapping and
/// uniqueness; extra collections and indexes in the database are ignored.
pub async fn verify<S>(store: &S, schema: &[CollectionSpec]) -> Result<VerifyReport, DbError>
where
    S: SchemaStore + ?Sized,
{
    validate_schema(schema)?;

    let existing: HashSet<String> = store.collection_names().await?.into_iter().collect();
    let mut report = VerifyReport::default();

    for collection in schema {
        if !existing.contains(&collection.name) {
            report.missing_collections.push(collection.name.clone());
            report.missing_indexes.extend(
                collection
                    .indexes
                    .iter()
                    .map(|index| format!("{}.{}", collection.name, index.store_name())),
            );
            continue;
        }

        let actual = store.indexes(&collection.name).await?;
        for index in &collection.indexes {
            let name = index.store_name();
            match actual.iter().find(|description| description.name == name) {
                None => report
                    .missing_indexes
                    .push(format!("{}.{}", collection.name, name)),
                Some(description)
                    if description.unique != index.unique
                        || !same_keys(&description.keys, &index.keys) =>
                {
                    report.mismatched_indexes.push(IndexMismatch {
                        collection: collection.name.clone(),
                        index: name,
                        expected_keys: index.keys.clone(),
                        actual_keys: description.keys.clone(),
                        expected_unique: index.unique,
                        actual_unique: description.unique,
                    })
                }
                Some(_) => {}
            }
        }
    }

    if report.is_clean() {
        tracing::info!(database = store.database_name(), "schema verified");
    } else {
        tracing::warn!(
            database = store.database_name(),
            missing_collections = report.missing_collections.len(),
            missing_indexes = report.missing_indexes.len(),
            mismatched_indexes = report.mismatched_indexes.len(),
            "schema drift detected"
        );
    }

    Ok(report)
}

/// Key mappings are equal when the ordered non-text keys match and the same
/// set of fields is text-indexed; the server does not keep text field order.
fn same_keys(actual: &[(String, IndexKey)], expected: &[(String, IndexKey)]) -> bool {
    fn split(keys: &[(String, IndexKey)]) -> (Vec<&(String, IndexKey)>, Vec<&str>) {
        let ordered = keys.iter().filter(|(_, key)| !key.is_text()).collect();
        let mut text: Vec<&str> = keys
            .iter()
            .filter(|(_, key)| key.is_text())
            .map(|(field, _)| field.as_str())
            .collect();
        text.sort_unstable();
        (ordered, text)
    }

    split(actual) == split(expected)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use dnd_schema_kernel::{IndexKey, IndexSpec, SchemaError};

    use super::*;
    use crate::store::IndexDescription;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Request {
        Collection(String),
        Index(String, String),
    }

    #[derive(Default)]
    struct State {
        collections: BTreeMap<String, Vec<IndexDescription>>,
        /// Documents per collection as `(name, user)` pairs.
        documents: BTreeMap<String, Vec<(String, i64)>>,
        requests: Vec<Request>,
    }

    /// In-memory store with create-if-absent semantics and unique checks
    /// over `(name, user)` documents.
    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<State>,
        unreachable: bool,
    }

    impl MemoryStore {
        fn with_documents(collection: &str, documents: &[(&str, i64)]) -> Self {
            let store = Self::default();
            {
                let mut state = store.state.lock().unwrap();
                state.collections.insert(collection.to_string(), vec![]);
                state.documents.insert(
                    collection.to_string(),
                    documents
                        .iter()
                        .map(|(name, user)| (name.to_string(), *user))
                        .collect(),
                );
            }
            store
        }

        fn with_index(collection: &str, index: IndexDescription) -> Self {
            let store = Self::default();
            store
                .state
                .lock()
                .unwrap()
                .collections
                .insert(collection.to_string(), vec![index]);
            store
        }

        fn requests(&self) -> Vec<Request> {
            self.state.lock().unwrap().requests.clone()
        }

        fn snapshot(&self) -> BTreeMap<String, Vec<IndexDescription>> {
            self.state.lock().unwrap().collections.clone()
        }
    }

    fn has_duplicates(documents: &[(String, i64)], index: &IndexSpec) -> bool {
        let key_of = |(name, user): &(String, i64)| {
            index
                .keys
                .iter()
                .map(|(field, _)| match field.as_str() {
                    "name" => name.clone(),
                    "user" => user.to_string(),
                    _ => String::new(),
                })
                .collect::<Vec<_>>()
        };
        let mut seen = HashSet::new();
        documents.iter().any(|document| !seen.insert(key_of(document)))
    }

    #[async_trait]
    impl SchemaStore for MemoryStore {
        fn database_name(&self) -> &str {
            "dnd"
        }

        async fn create_collection(&self, name: &str) -> Result<CollectionOutcome, DbError> {
            if self.unreachable {
                return Err(DbError::CreateCollection {
                    collection: name.to_string(),
                    source: "authentication failed".into(),
                });
            }
            let mut state = self.state.lock().unwrap();
            state.requests.push(Request::Collection(name.to_string()));
            if state.collections.contains_key(name) {
                return Ok(CollectionOutcome::AlreadyExists);
            }
            state.collections.insert(name.to_string(), vec![]);
            Ok(CollectionOutcome::Created)
        }

        async fn create_index(
            &self,
            collection: &str,
            index: &IndexSpec,
        ) -> Result<String, DbError> {
            let mut state = self.state.lock().unwrap();
            state
                .requests
                .push(Request::Index(collection.to_string(), index.store_name()));

            if index.unique {
                let documents = state.documents.get(collection).cloned().unwrap_or_default();
                if has_duplicates(&documents, index) {
                    return Err(DbError::CreateIndex {
                        collection: collection.to_string(),
                        index: index.store_name(),
                        source: "E11000 duplicate key error".into(),
                    });
                }
            }

            let name = index.store_name();
            let indexes = state.collections.entry(collection.to_string()).or_default();
            if !indexes.iter().any(|existing| existing.name == name) {
                indexes.push(IndexDescription {
                    name: name.clone(),
                    keys: index.keys.clone(),
                    unique: index.unique,
                });
            }
            Ok(name)
        }

        async fn collection_names(&self) -> Result<Vec<String>, DbError> {
            Ok(self.state.lock().unwrap().collections.keys().cloned().collect())
        }

        async fn indexes(&self, collection: &str) -> Result<Vec<IndexDescription>, DbError> {
            let state = self.state.lock().unwrap();
            Ok(state.collections.get(collection).cloned().unwrap_or_default())
        }
    }

    fn schema() -> Vec<CollectionSpec> {
        vec![
            CollectionSpec::new("user_potions")
                .with_index(IndexSpec::new().ascending("name").ascending("user").unique()),
            CollectionSpec::new("user_info"),
            CollectionSpec::new("user_npcs")
                .with_index(IndexSpec::new().ascending("name").ascending("user").unique())
                .with_index(IndexSpec::new().text("name")),
        ]
    }

    #[tokio::test]
    async fn requests_follow_schema_order() {
        let store = MemoryStore::default();

        let report = provision(&store, &schema()).await.unwrap();

        assert_eq!(
            store.requests(),
            vec![
                Request::Collection("user_potions".into()),
                Request::Index("user_potions".into(), "name_1_user_1".into()),
                Request::Collection("user_info".into()),
                Request::Collection("user_npcs".into()),
                Request::Index("user_npcs".into(), "name_1_user_1".into()),
                Request::Index("user_npcs".into(), "name_text".into()),
            ]
        );
        assert_eq!(
            report.created_collections,
            vec!["user_potions", "user_info", "user_npcs"]
        );
        assert!(report.existing_collections.is_empty());
        assert_eq!(
            report.ensured_indexes,
            vec![
                "user_potions.name_1_user_1",
                "user_npcs.name_1_user_1",
                "user_npcs.name_text"
            ]
        );
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let store = MemoryStore::default();

        provision(&store, &schema()).await.unwrap();
        let after_first = store.snapshot();
        let report = provision(&store, &schema()).await.unwrap();

        assert_eq!(store.snapshot(), after_first);
        assert!(report.created_collections.is_empty());
        assert_eq!(
            report.existing_collections,
            vec!["user_potions", "user_info", "user_npcs"]
        );
        assert_eq!(report.ensured_indexes.len(), 3);
    }

    #[tokio::test]
    async fn provisioned_schema_verifies_clean() {
        let store = MemoryStore::default();

        let before = verify(&store, &schema()).await.unwrap();
        assert_eq!(
            before.missing_collections,
            vec!["user_potions", "user_info", "user_npcs"]
        );
        assert_eq!(before.missing_indexes.len(), 3);

        provision(&store, &schema()).await.unwrap();

        let after = verify(&store, &schema()).await.unwrap();
        assert!(after.is_clean(), "{after:?}");
    }

    #[tokio::test]
    async fn uniqueness_mismatch_is_reported() {
        let store = MemoryStore::default();
        let loose = vec![CollectionSpec::new("user_potions")
            .with_index(IndexSpec::new().ascending("name").ascending("user"))];
        provision(&store, &loose).await.unwrap();

        let report = verify(&store, &schema()[..1]).await.unwrap();

        assert_eq!(
            report.mismatched_indexes,
            vec![IndexMismatch {
                collection: "user_potions".into(),
                index: "name_1_user_1".into(),
                expected_keys: schema()[0].indexes[0].keys.clone(),
                actual_keys: schema()[0].indexes[0].keys.clone(),
                expected_unique: true,
                actual_unique: false,
            }]
        );
        assert!(report.missing_indexes.is_empty());
    }

    #[tokio::test]
    async fn key_mismatch_under_the_declared_name_is_reported() {
        let wrong_keys = vec![
            ("user".to_string(), IndexKey::Ascending),
            ("name".to_string(), IndexKey::Ascending),
        ];
        let store = MemoryStore::with_index(
            "user_potions",
            IndexDescription {
                name: "name_1_user_1".into(),
                keys: wrong_keys.clone(),
                unique: true,
            },
        );

        let report = verify(&store, &schema()[..1]).await.unwrap();

        assert_eq!(report.mismatched_indexes.len(), 1);
        let mismatch = &report.mismatched_indexes[0];
        assert_eq!(mismatch.actual_keys, wrong_keys);
        assert_eq!(mismatch.expected_keys, schema()[0].indexes[0].keys);
        assert!(mismatch.actual_unique && mismatch.expected_unique);
    }

    #[test]
    fn text_fields_compare_as_a_set() {
        let declared = vec![
            ("user".to_string(), IndexKey::Ascending),
            ("title".to_string(), IndexKey::Text),
            ("name".to_string(), IndexKey::Text),
        ];
        let reported = vec![
            ("user".to_string(), IndexKey::Ascending),
            ("name".to_string(), IndexKey::Text),
            ("title".to_string(), IndexKey::Text),
        ];
        assert!(same_keys(&reported, &declared));

        let descending = vec![
            ("user".to_string(), IndexKey::Descending),
            ("name".to_string(), IndexKey::Text),
            ("title".to_string(), IndexKey::Text),
        ];
        assert!(!same_keys(&descending, &declared));
        assert!(!same_keys(&reported[..2], &declared));
    }

    #[tokio::test]
    async fn duplicate_documents_fail_unique_index_and_stop_the_run() {
        let store = MemoryStore::with_documents("user_potions", &[("elixir", 7), ("elixir", 7)]);

        let err = provision(&store, &schema()).await.unwrap_err();

        match &err {
            DbError::CreateIndex {
                collection, index, ..
            } => {
                assert_eq!(collection, "user_potions");
                assert_eq!(index, "name_1_user_1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            std::error::Error::source(&err).map(|e| e.to_string()),
            Some("E11000 duplicate key error".to_string())
        );
        // Nothing after the failing index is requested.
        assert_eq!(
            store.requests().last(),
            Some(&Request::Index("user_potions".into(), "name_1_user_1".into()))
        );
        assert!(!store.snapshot().contains_key("user_info"));
    }

    #[tokio::test]
    async fn distinct_users_may_share_a_name() {
        let store = MemoryStore::with_documents("user_potions", &[("elixir", 7), ("elixir", 8)]);

        let report = provision(&store, &schema()).await.unwrap();

        assert_eq!(report.existing_collections, vec!["user_potions"]);
    }

    #[tokio::test]
    async fn connection_failure_is_surfaced() {
        let store = MemoryStore {
            unreachable: true,
            ..MemoryStore::default()
        };

        let err = provision(&store, &schema()).await.unwrap_err();

        assert!(matches!(err, DbError::CreateCollection { ref collection, .. } if collection == "user_potions"));
        assert!(store.requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_schema_issues_no_requests() {
        let store = MemoryStore::default();
        let broken = vec![CollectionSpec::new("user_potions").with_index(IndexSpec {
            keys: vec![
                ("name".to_string(), IndexKey::Text),
                ("user".to_string(), IndexKey::Text),
            ],
            unique: true,
        })];

        let err = provision(&store, &broken).await.unwrap_err();

        assert!(matches!(
            err,
            DbError::Schema(SchemaError::UniqueTextIndex { .. })
        ));
        assert!(store.requests().is_empty());
    }
}
