//! Collection Store
//!
//! Create, read, update and delete over named collections of [`Document`]s.
//! Every mutation runs inside its collection's lane (see [`MutationLanes`]):
//! read the whole collection, apply the change, write it back once, commit.

use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::backend::{CollectionBackend, FileBackend, MemoryBackend};
use super::error::{StorageError, StorageResult};
use super::lanes::{LaneGuard, MutationLanes};
use crate::document::{Document, DocumentInput, Fields, InsertOutput, WhereClause};

/// Source of "now" in seconds since the Unix epoch
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Check that a collection name is safe to use as a file stem.
///
/// Allowed: non-empty, ASCII letters, digits, `-` and `_`.
pub fn validate_collection_name(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidCollectionName(name.to_string()))
    }
}

/// Named collections of documents over a pluggable backend.
pub struct CollectionStore {
    backend: Arc<dyn CollectionBackend>,
    lanes: MutationLanes,
    clock: Clock,
}

impl std::fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("lanes", &self.lanes.len())
            .finish_non_exhaustive()
    }
}

impl CollectionStore {
    /// Store over any backend
    pub fn new(backend: Arc<dyn CollectionBackend>) -> Self {
        Self {
            backend,
            lanes: MutationLanes::new(),
            clock: Arc::new(|| Utc::now().timestamp()),
        }
    }

    /// File-backed store rooted at `data_dir`
    pub fn open(data_dir: impl Into<PathBuf>, pretty: bool) -> Self {
        Self::new(Arc::new(FileBackend::new(data_dir).with_pretty(pretty)))
    }

    /// Volatile store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Builder-style: replace the timestamp source
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Mutation lanes, for diagnostics
    pub fn lanes(&self) -> &MutationLanes {
        &self.lanes
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Ensure the backing location exists. Idempotent and safe to call concurrently.
    pub async fn initialize(&self) -> StorageResult<()> {
        self.backend.prepare().await?;
        info!("Collection store initialized");
        Ok(())
    }

    /// Names of collections that exist, sorted
    pub async fn collections(&self) -> StorageResult<Vec<String>> {
        self.backend.list().await
    }

    /// All documents matching `filter`, in stored order.
    pub async fn find(
        &self,
        collection: &str,
        filter: &WhereClause,
    ) -> StorageResult<Vec<Document>> {
        validate_collection_name(collection)?;

        let documents = self.load(collection).await?;
        let total = documents.len();
        let matches: Vec<Document> = documents
            .into_iter()
            .filter(|document| filter.matches(document))
            .collect();

        debug!(
            "find on '{}' matched {} of {} documents",
            collection,
            matches.len(),
            total
        );
        Ok(matches)
    }

    /// Append new documents and return them, mirroring the input shape.
    ///
    /// The whole batch is rejected if any supplied id already exists or repeats.
    pub async fn insert(
        &self,
        collection: &str,
        input: DocumentInput,
    ) -> StorageResult<InsertOutput> {
        validate_collection_name(collection)?;

        let (records, single) = match input {
            DocumentInput::One(fields) => (vec![fields], true),
            DocumentInput::Many(records) if records.is_empty() => {
                return Ok(InsertOutput::Many(Vec::new()));
            }
            DocumentInput::Many(records) => (records, false),
        };

        let guard = self.lanes.admit(collection).await;
        let mut documents = self.load(collection).await?;
        let mut ids: HashSet<String> = documents.iter().map(|d| d.id.clone()).collect();

        let now = self.now();
        let mut created = Vec::with_capacity(records.len());
        for fields in records {
            let document = Document::stamp(fields, now)?;
            if !ids.insert(document.id.clone()) {
                return Err(StorageError::DuplicateId {
                    collection: collection.to_string(),
                    id: document.id,
                });
            }
            created.push(document);
        }

        documents.extend(created.iter().cloned());
        self.persist(guard, &documents).await?;
        debug!("Inserted {} documents into '{}'", created.len(), collection);

        if single {
            match created.pop() {
                Some(document) => Ok(InsertOutput::One(document)),
                None => Ok(InsertOutput::Many(created)),
            }
        } else {
            Ok(InsertOutput::Many(created))
        }
    }

    /// Merge `patch` onto every match and return the updated documents.
    ///
    /// Writes only when something matched.
    pub async fn update(
        &self,
        collection: &str,
        filter: &WhereClause,
        patch: &Fields,
    ) -> StorageResult<Vec<Document>> {
        validate_collection_name(collection)?;

        let guard = self.lanes.admit(collection).await;
        let mut documents = self.load(collection).await?;

        let now = self.now();
        let mut updated = Vec::new();
        for document in documents.iter_mut().filter(|d| filter.matches(d)) {
            let changed = document.apply_patch(patch);
            document.touch(now, changed);
            updated.push(document.clone());
        }

        if updated.is_empty() {
            debug!("update on '{}' matched nothing", collection);
            return Ok(updated);
        }

        self.persist(guard, &documents).await?;
        debug!("Updated {} documents in '{}'", updated.len(), collection);
        Ok(updated)
    }

    /// Remove every match and return how many were removed.
    ///
    /// Writes only when something matched.
    pub async fn delete(&self, collection: &str, filter: &WhereClause) -> StorageResult<usize> {
        validate_collection_name(collection)?;

        let guard = self.lanes.admit(collection).await;
        let mut documents = self.load(collection).await?;

        let before = documents.len();
        documents.retain(|document| !filter.matches(document));
        let removed = before - documents.len();

        if removed == 0 {
            debug!("delete on '{}' matched nothing", collection);
            return Ok(0);
        }

        self.persist(guard, &documents).await?;
        debug!("Deleted {} documents from '{}'", removed, collection);
        Ok(removed)
    }

    /// Overwrite a collection with `documents` as given, without stamping.
    pub async fn replace_all(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StorageResult<()> {
        validate_collection_name(collection)?;

        let mut ids = HashSet::with_capacity(documents.len());
        for document in &documents {
            if !ids.insert(document.id.as_str()) {
                return Err(StorageError::DuplicateId {
                    collection: collection.to_string(),
                    id: document.id.clone(),
                });
            }
        }

        let guard = self.lanes.admit(collection).await;
        self.persist(guard, &documents).await?;
        debug!("Replaced '{}' with {} documents", collection, documents.len());
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn load(&self, collection: &str) -> StorageResult<Vec<Document>> {
        Ok(self.backend.read(collection).await?.unwrap_or_default())
    }

    async fn persist(&self, guard: LaneGuard, documents: &[Document]) -> StorageResult<()> {
        let collection = guard.collection().to_string();
        if let Err(e) = self.backend.write(&collection, documents).await {
            error!("Failed to persist collection '{}': {}", collection, e);
            return Err(e);
        }
        guard.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicI64, Ordering};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn fixed_clock(at: i64) -> (Clock, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(at));
        let handle = Arc::clone(&now);
        let clock: Clock = Arc::new(move || handle.load(Ordering::SeqCst));
        (clock, now)
    }

    fn store_with_backend() -> (CollectionStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = CollectionStore::new(backend.clone());
        (store, backend)
    }

    #[test]
    fn test_collection_names() {
        assert!(validate_collection_name("notes").is_ok());
        assert!(validate_collection_name("my-notes_2").is_ok());

        for bad in ["", "../etc", "a/b", "notes.json", "ñ"] {
            assert!(
                matches!(
                    validate_collection_name(bad),
                    Err(StorageError::InvalidCollectionName(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_insert_one_mirrors_shape() {
        let store = CollectionStore::in_memory();

        let output = store
            .insert("notes", DocumentInput::One(fields(json!({"title": "A"}))))
            .await
            .unwrap();

        let document = output.into_one().expect("single input yields single output");
        assert_eq!(document.get_str("title"), Some("A"));
        assert_eq!(document.created_at, document.updated_at);
    }

    #[tokio::test]
    async fn test_insert_many_preserves_order() {
        let store = CollectionStore::in_memory();

        let output = store
            .insert(
                "notes",
                DocumentInput::Many(vec![
                    fields(json!({"title": "A"})),
                    fields(json!({"title": "B"})),
                ]),
            )
            .await
            .unwrap();

        let titles: Vec<_> = output
            .into_vec()
            .iter()
            .map(|d| d.get_str("title").unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);

        let stored = store.find("notes", &WhereClause::all()).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_does_not_write() {
        let (store, backend) = store_with_backend();

        let output = store.insert("notes", DocumentInput::Many(vec![])).await.unwrap();

        assert_eq!(output, InsertOutput::Many(vec![]));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_rejected() {
        let (store, backend) = store_with_backend();
        store
            .insert("notes", DocumentInput::One(fields(json!({"id": "x1"}))))
            .await
            .unwrap();

        let existing = store
            .insert("notes", DocumentInput::One(fields(json!({"id": "x1"}))))
            .await
            .unwrap_err();
        assert!(matches!(existing, StorageError::DuplicateId { ref id, .. } if id == "x1"));

        let repeated = store
            .insert(
                "notes",
                DocumentInput::Many(vec![
                    fields(json!({"id": "x2"})),
                    fields(json!({"id": "x2"})),
                ]),
            )
            .await
            .unwrap_err();
        assert!(matches!(repeated, StorageError::DuplicateId { .. }));

        assert_eq!(backend.write_count(), 1);
        assert_eq!(backend.snapshot("notes").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_and_ignores_reserved_fields() {
        let (clock, now) = fixed_clock(1_000);
        let store = CollectionStore::in_memory().with_clock(clock);
        let record = fields(json!({"id": "x1", "title": "A", "rank": 1}));
        store.insert("notes", DocumentInput::One(record)).await.unwrap();

        now.store(2_000, Ordering::SeqCst);
        let updated = store
            .update(
                "notes",
                &WhereClause::by_id("x1"),
                &fields(json!({"title": "B", "id": "other", "createdAt": 5})),
            )
            .await
            .unwrap();

        assert_eq!(updated.len(), 1);
        let document = &updated[0];
        assert_eq!(document.id, "x1");
        assert_eq!(document.get_str("title"), Some("B"));
        assert_eq!(document.fields.get("rank"), Some(&json!(1)));
        assert_eq!(document.created_at, 1_000);
        assert_eq!(document.updated_at, 2_000);
    }

    #[tokio::test]
    async fn test_update_within_same_second_still_advances() {
        let (clock, _now) = fixed_clock(1_000);
        let store = CollectionStore::in_memory().with_clock(clock);
        store
            .insert("notes", DocumentInput::One(fields(json!({"id": "x1", "n": 0}))))
            .await
            .unwrap();

        let mut last = 1_000;
        for n in 1..=3 {
            let updated = store
                .update("notes", &WhereClause::by_id("x1"), &fields(json!({ "n": n })))
                .await
                .unwrap();
            assert!(updated[0].updated_at > last);
            last = updated[0].updated_at;
        }
    }

    #[tokio::test]
    async fn test_no_match_update_and_delete_do_not_write() {
        let (store, backend) = store_with_backend();
        store
            .insert("notes", DocumentInput::One(fields(json!({"title": "A"}))))
            .await
            .unwrap();

        let filter = WhereClause::all().eq("title", "missing");
        let updated = store
            .update("notes", &filter, &fields(json!({"title": "B"})))
            .await
            .unwrap();
        let deleted = store.delete("notes", &filter).await.unwrap();

        assert!(updated.is_empty());
        assert_eq!(deleted, 0);
        assert_eq!(backend.write_count(), 1);
        assert_eq!(store.lanes().generation("notes"), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_all_matches() {
        let store = CollectionStore::in_memory();
        store
            .insert(
                "notes",
                DocumentInput::Many(vec![
                    fields(json!({"parentId": "p"})),
                    fields(json!({"parentId": "p"})),
                    fields(json!({"parentId": null})),
                ]),
            )
            .await
            .unwrap();

        let removed = store
            .delete("notes", &WhereClause::all().eq("parentId", "p"))
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.find("notes", &WhereClause::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_all_keeps_documents_verbatim() {
        let store = CollectionStore::in_memory();
        let documents = vec![
            Document::new("a", 10, fields(json!({"title": "A"}))),
            Document::new("b", 20, Fields::new()),
        ];

        store.replace_all("notes", documents.clone()).await.unwrap();

        assert_eq!(store.find("notes", &WhereClause::all()).await.unwrap(), documents);

        let duplicate = vec![
            Document::new("a", 1, Fields::new()),
            Document::new("a", 2, Fields::new()),
        ];
        assert!(matches!(
            store.replace_all("notes", duplicate).await,
            Err(StorageError::DuplicateId { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_and_generation() {
        let (store, backend) = store_with_backend();
        store
            .insert("notes", DocumentInput::One(fields(json!({"id": "x1", "title": "A"}))))
            .await
            .unwrap();

        backend.set_fail_writes(true);
        let err = store
            .update("notes", &WhereClause::by_id("x1"), &fields(json!({"title": "B"})))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::PersistenceFailure { .. }));
        assert_eq!(store.lanes().generation("notes"), 1);

        backend.set_fail_writes(false);
        let stored = store.find("notes", &WhereClause::by_id("x1")).await.unwrap();
        assert_eq!(stored[0].get_str("title"), Some("A"));
    }

    #[tokio::test]
    async fn test_invalid_collection_name_is_rejected_everywhere() {
        let store = CollectionStore::in_memory();

        assert!(store.find("../x", &WhereClause::all()).await.is_err());
        assert!(store.delete("a/b", &WhereClause::all()).await.is_err());
        assert!(store
            .insert("", DocumentInput::One(Fields::new()))
            .await
            .is_err());
    }
}
