//! Property-based and concurrency tests for the collection store
//!
//! Covers where-clause semantics, id uniqueness, timestamp monotonicity and
//! the absence of lost updates under concurrent mutation.

use myrkat_core::storage::{CollectionStore, StorageError};
use myrkat_core::{Document, DocumentInput, Fields, WhereClause};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_are_all_kept() {
    for n in [2usize, 10, 100] {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CollectionStore::open(dir.path(), true));
        store.initialize().await.unwrap();

        let tasks: Vec<_> = (0..n)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .insert("notes", DocumentInput::One(fields(json!({ "n": i }))))
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = store.find("notes", &WhereClause::all()).await.unwrap();
        assert_eq!(stored.len(), n, "lost inserts with {n} writers");

        let ids: HashSet<_> = stored.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids.len(), n);

        let values: HashSet<_> = stored.iter().map(|d| d.fields["n"].clone()).collect();
        assert_eq!(values.len(), n);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_do_not_lose_fields() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CollectionStore::open(dir.path(), false));
    store
        .insert("notes", DocumentInput::One(fields(json!({"id": "shared"}))))
        .await
        .unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut patch = Fields::new();
                patch.insert(format!("f{i}"), json!(i));
                store.update("notes", &WhereClause::by_id("shared"), &patch).await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().len(), 1);
    }

    let stored = store.find("notes", &WhereClause::by_id("shared")).await.unwrap();
    for i in 0..20 {
        assert_eq!(stored[0].fields.get(&format!("f{i}")), Some(&json!(i)));
    }
    assert_eq!(store.lanes().generation("notes"), 21);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_mutations_on_separate_collections() {
    let store = Arc::new(CollectionStore::in_memory());

    let tasks: Vec<_> = ["notes", "tasks", "tags"]
        .into_iter()
        .flat_map(|collection| {
            (0..10).map({
                let store = Arc::clone(&store);
                move |i| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        store
                            .insert(collection, DocumentInput::One(fields(json!({ "i": i }))))
                            .await
                    })
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for collection in ["notes", "tasks", "tags"] {
        let stored = store.find(collection, &WhereClause::all()).await.unwrap();
        assert_eq!(stored.len(), 10);
    }
    assert_eq!(store.collections().await.unwrap(), vec!["notes", "tags", "tasks"]);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: find returns exactly the documents whose fields equal the clause
    #[test]
    fn find_matches_strict_equality(
        rows in prop::collection::vec((0u8..3, prop::option::of(0u8..3)), 0..25),
        want_a in 0u8..3,
        want_b in prop::option::of(0u8..3),
    ) {
        let store = CollectionStore::in_memory();
        let records: Vec<Fields> = rows
            .iter()
            .map(|(a, b)| {
                let mut record = fields(json!({ "a": a }));
                if let Some(b) = b {
                    record.insert("b".to_string(), json!(b));
                }
                record
            })
            .collect();

        let mut filter = WhereClause::all().eq("a", want_a);
        if let Some(b) = want_b {
            filter = filter.eq("b", b);
        }

        let found = block_on(async {
            store.insert("rows", DocumentInput::Many(records)).await.unwrap();
            store.find("rows", &filter).await.unwrap()
        });

        let expected = rows
            .iter()
            .filter(|(a, b)| *a == want_a && want_b.map_or(true, |want| *b == Some(want)))
            .count();
        prop_assert_eq!(found.len(), expected);
        prop_assert!(found.iter().all(|d| filter.matches(d)));
    }

    /// Property: a batch with a repeated id is rejected as a whole
    #[test]
    fn batch_ids_must_be_unique(ids in prop::collection::vec("[a-d]", 1..8)) {
        let store = CollectionStore::in_memory();
        let records: Vec<Fields> = ids.iter().map(|id| fields(json!({ "id": id }))).collect();
        let distinct = ids.iter().collect::<HashSet<_>>().len();

        let (result, stored) = block_on(async {
            let result = store.insert("items", DocumentInput::Many(records)).await;
            let stored = store.find("items", &WhereClause::all()).await.unwrap();
            (result, stored)
        });

        if distinct == ids.len() {
            prop_assert!(result.is_ok());
            prop_assert_eq!(stored.len(), ids.len());
        } else {
            let is_duplicate = matches!(result, Err(StorageError::DuplicateId { .. }));
            prop_assert!(is_duplicate);
            prop_assert!(stored.is_empty());
        }
    }

    /// Property: updatedAt never goes backwards, never precedes createdAt and
    /// moves forward on every effective change
    #[test]
    fn updated_at_is_monotonic(values in prop::collection::vec(0u8..3, 1..12)) {
        let store = CollectionStore::in_memory();

        let history: Vec<(Document, bool)> = block_on(async {
            let created = store
                .insert("notes", DocumentInput::One(fields(json!({"id": "n", "v": 0}))))
                .await
                .unwrap();
            let mut previous = created.into_one().unwrap();
            let mut history = vec![(previous.clone(), false)];

            for v in values {
                let changed = previous.fields["v"] != json!(v);
                let updated = store
                    .update("notes", &WhereClause::by_id("n"), &fields(json!({ "v": v })))
                    .await
                    .unwrap();
                previous = updated[0].clone();
                history.push((previous.clone(), changed));
            }
            history
        });

        for pair in history.windows(2) {
            let (before, _) = &pair[0];
            let (after, changed) = &pair[1];
            prop_assert!(after.updated_at >= after.created_at);
            prop_assert_eq!(after.created_at, before.created_at);
            if *changed {
                prop_assert!(after.updated_at > before.updated_at);
            } else {
                prop_assert!(after.updated_at >= before.updated_at);
            }
        }
    }
}
