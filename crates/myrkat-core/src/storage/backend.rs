//! Collection backends
//!
//! A backend moves whole collections in and out of durable storage. It knows
//! nothing about where-clauses or ids; [`CollectionStore`](super::CollectionStore)
//! layers those on top.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use crate::document::Document;

/// File extension of a persisted collection
pub const COLLECTION_EXTENSION: &str = "json";

/// Durable home for whole collections.
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    /// Make the backend ready for use. Must be idempotent.
    async fn prepare(&self) -> StorageResult<()>;

    /// Read the full contents of a collection.
    ///
    /// Returns `None` when the collection has never been written.
    async fn read(&self, collection: &str) -> StorageResult<Option<Vec<Document>>>;

    /// Replace the full contents of a collection.
    ///
    /// Either the new contents become durable or the previous contents stay intact.
    async fn write(&self, collection: &str, documents: &[Document]) -> StorageResult<()>;

    /// Names of collections that have been written, sorted.
    async fn list(&self) -> StorageResult<Vec<String>>;
}

// ============================================================================
// File backend
// ============================================================================

/// One `<collection>.json` file per collection under a root directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
    pretty: bool,
}

impl FileBackend {
    /// Backend rooted at `root`, writing indented JSON.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pretty: true,
        }
    }

    /// Builder-style: choose between indented and compact JSON
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `collection`
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.{}", collection, COLLECTION_EXTENSION))
    }

    fn temp_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.{}.tmp", collection, COLLECTION_EXTENSION))
    }

    fn encode(&self, collection: &str, documents: &[Document]) -> StorageResult<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(documents)
        } else {
            serde_json::to_vec(documents)
        };
        encoded.map_err(|e| StorageError::persistence(collection, e))
    }

    async fn write_atomically(&self, collection: &str, bytes: &[u8]) -> std::io::Result<()> {
        let temp_path = self.temp_path(collection);

        let mut file = tokio::fs::File::create(&temp_path).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, self.collection_path(collection)).await
    }
}

#[async_trait]
impl CollectionBackend for FileBackend {
    async fn prepare(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::Initialization {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;

        debug!("Storage directory ready: {}", self.root.display());
        Ok(())
    }

    async fn read(&self, collection: &str) -> StorageResult<Option<Vec<Document>>> {
        let path = self.collection_path(collection);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                let reason = format!("read failed: {}", e);
                return Err(StorageError::corrupt(collection, reason));
            }
        };

        let documents: Vec<Document> = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::corrupt(collection, e))?;

        Ok(Some(documents))
    }

    async fn write(&self, collection: &str, documents: &[Document]) -> StorageResult<()> {
        let bytes = self.encode(collection, documents)?;

        if let Err(e) = self.write_atomically(collection, &bytes).await {
            let temp_path = self.temp_path(collection);
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(
                        "Could not remove temporary file {}: {}",
                        temp_path.display(),
                        cleanup
                    );
                }
            }
            return Err(StorageError::persistence(collection, e));
        }

        debug!(
            "Persisted {} documents to {}",
            documents.len(),
            self.collection_path(collection).display()
        );
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Initialization {
                    path: self.root.clone(),
                    reason: e.to_string(),
                })
            }
        };

        let mut names = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(StorageError::Initialization {
                        path: self.root.clone(),
                        reason: e.to_string(),
                    })
                }
            };

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(COLLECTION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

// ============================================================================
// Memory backend
// ============================================================================

/// Volatile backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Arc<Vec<Document>>>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    /// Empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection as if it had been written earlier.
    pub fn seed(&self, collection: impl Into<String>, documents: Vec<Document>) {
        self.collections
            .write()
            .insert(collection.into(), Arc::new(documents));
    }

    /// Current contents of a collection
    pub fn snapshot(&self, collection: &str) -> Option<Arc<Vec<Document>>> {
        self.collections.read().get(collection).cloned()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with a persistence error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CollectionBackend for MemoryBackend {
    async fn prepare(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn read(&self, collection: &str) -> StorageResult<Option<Vec<Document>>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|documents| documents.as_ref().clone()))
    }

    async fn write(&self, collection: &str, documents: &[Document]) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::persistence(collection, "writes disabled"));
        }

        self.collections
            .write()
            .insert(collection.to_string(), Arc::new(documents.to_vec()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Fields;
    use tempfile::TempDir;

    fn doc(id: &str) -> Document {
        Document::new(id, 1_700_000_000, Fields::new())
    }

    #[tokio::test]
    async fn test_prepare_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("data"));

        backend.prepare().await.unwrap();
        backend.prepare().await.unwrap();

        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn test_read_missing_collection_is_none() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        assert_eq!(backend.read("notes").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_collection_reports_read_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("notes.json")).unwrap();
        let backend = FileBackend::new(dir.path());

        match backend.read("notes").await {
            Err(StorageError::CorruptCollection { collection, reason }) => {
                assert_eq!(collection, "notes");
                assert!(reason.starts_with("read failed: "), "{}", reason);
            }
            other => panic!("expected a read failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        backend.write("notes", &[doc("a"), doc("b")]).await.unwrap();
        let documents = backend.read("notes").await.unwrap().unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].id, "a");
        assert!(!dir.path().join("notes.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_pretty_output_uses_two_space_indent() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        backend.write("notes", &[doc("a")]).await.unwrap();
        let text = std::fs::read_to_string(dir.path().join("notes.json")).unwrap();

        assert!(text.starts_with("[\n  {\n    \"id\": \"a\""));
    }

    #[tokio::test]
    async fn test_compact_output() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path()).with_pretty(false);

        backend.write("notes", &[]).await.unwrap();
        let text = std::fs::read_to_string(dir.path().join("notes.json")).unwrap();

        assert_eq!(text, "[]");
    }

    #[tokio::test]
    async fn test_unparseable_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.json"), "{not json").unwrap();
        let backend = FileBackend::new(dir.path());

        let err = backend.read("notes").await.unwrap_err();
        assert!(err.is_corruption());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_contents() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.write("notes", &[doc("a")]).await.unwrap();
        let before = std::fs::read(dir.path().join("notes.json")).unwrap();

        // A directory squatting on the temp path makes the write fail.
        std::fs::create_dir(dir.path().join("notes.json.tmp")).unwrap();

        let err = backend.write("notes", &[doc("b")]).await.unwrap_err();
        assert!(matches!(err, StorageError::PersistenceFailure { .. }));
        assert_eq!(std::fs::read(dir.path().join("notes.json")).unwrap(), before);
    }

    #[tokio::test]
    async fn test_list_only_reports_json_files() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.write("tasks", &[]).await.unwrap();
        backend.write("notes", &[]).await.unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();

        assert_eq!(backend.list().await.unwrap(), vec!["notes", "tasks"]);
    }

    #[tokio::test]
    async fn test_memory_backend_failure_switch() {
        let backend = MemoryBackend::new();
        backend.write("notes", &[doc("a")]).await.unwrap();

        backend.set_fail_writes(true);
        assert!(backend.write("notes", &[]).await.is_err());

        assert_eq!(backend.write_count(), 1);
        assert_eq!(backend.snapshot("notes").unwrap().len(), 1);
    }
}
