//! Note operations driven through the storage client and the bus.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::model::{self, Note};
use super::tree::{build_note_tree, NoteTree};
use crate::document::{Document, Fields, WhereClause};
use crate::events::{
    EventBus, Notification, PublishReport, SearchEntry, SearchOptions, SearchSnapshot, Subscriber,
    SubscriptionId, NOTE_SELECTED,
};
use crate::plugins::notes::NOTES_COLLECTION;
use crate::service::{ClientError, StorageClient};

/// Errors from [`NotesController`]
#[derive(Error, Debug)]
pub enum NotesError {
    #[error(transparent)]
    Storage(#[from] ClientError),

    #[error("Note '{id}' is malformed: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Note '{0}' not found")]
    NotFound(String),
}

pub type NotesResult<T> = Result<T, NotesError>;

fn to_note(document: &Document) -> NotesResult<Note> {
    Note::from_document(document).map_err(|source| NotesError::Malformed {
        id: document.id.clone(),
        source,
    })
}

// ============================================================================
// Selection tracking
// ============================================================================

/// Remembers the id carried by the latest `note:selected` event.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    selected: RwLock<Option<String>>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.selected.read().clone()
    }
}

#[async_trait]
impl Subscriber for SelectionTracker {
    async fn on_event(&self, _topic: &str, payload: &Value) -> anyhow::Result<()> {
        let selected = match payload {
            Value::Null => None,
            other => match other.get("id").and_then(Value::as_str) {
                Some(id) => Some(id.to_string()),
                None => anyhow::bail!("note:selected payload has no string id"),
            },
        };
        *self.selected.write() = selected;
        Ok(())
    }
}

// ============================================================================
// Controller
// ============================================================================

/// The notes plugin's behaviour: CRUD over the `notes` collection plus the
/// notifications the shell listens to.
#[derive(Debug)]
pub struct NotesController {
    client: StorageClient,
    selection: Arc<SelectionTracker>,
    subscription: Option<SubscriptionId>,
}

impl NotesController {
    pub fn new(client: StorageClient) -> Self {
        Self {
            client,
            selection: Arc::new(SelectionTracker::new()),
            subscription: None,
        }
    }

    fn bus(&self) -> &EventBus {
        self.client.bus()
    }

    /// Start tracking `note:selected`. Calling it again does nothing.
    pub fn attach(&mut self) {
        if self.subscription.is_none() {
            let tracker: Arc<dyn Subscriber> = self.selection.clone();
            self.subscription = Some(self.bus().subscribe(NOTE_SELECTED, tracker));
        }
    }

    /// Stop tracking `note:selected`.
    pub fn detach(&mut self) -> bool {
        match self.subscription.take() {
            Some(id) => self.bus().unsubscribe(NOTE_SELECTED, id),
            None => false,
        }
    }

    /// Id of the currently selected note, if tracking is attached
    pub fn selected_id(&self) -> Option<String> {
        self.selection.selected_id()
    }

    pub async fn list(&self) -> NotesResult<Vec<Note>> {
        let documents = self.client.find(NOTES_COLLECTION, WhereClause::all()).await?;
        documents.iter().map(to_note).collect()
    }

    pub async fn get(&self, id: &str) -> NotesResult<Option<Note>> {
        match self.client.find_by_id(NOTES_COLLECTION, id).await? {
            Some(document) => Ok(Some(to_note(&document)?)),
            None => Ok(None),
        }
    }

    pub async fn tree(&self) -> NotesResult<Vec<NoteTree>> {
        Ok(build_note_tree(&self.list().await?))
    }

    /// Insert an untitled note under `parent_id` and select it.
    pub async fn create(&self, parent_id: Option<&str>) -> NotesResult<Note> {
        let document = self
            .client
            .insert_one(NOTES_COLLECTION, model::untitled(parent_id))
            .await?;
        let note = to_note(&document)?;
        debug!("Created note '{}'", note.id);

        Notification::NoteSelected(Some(document)).publish(self.bus()).await;
        Ok(note)
    }

    /// Set the title and re-publish the note on `note:selected`.
    ///
    /// Blank titles and unchanged titles are ignored.
    pub async fn rename(&self, id: &str, title: &str) -> NotesResult<Option<Note>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }

        let current = self.get(id).await?.ok_or_else(|| NotesError::NotFound(id.to_string()))?;
        if current.title == title {
            return Ok(None);
        }

        let patch = [("title", Value::from(title))];
        let Some(document) = self.patch_document(id, patch).await? else {
            return Ok(None);
        };
        let note = to_note(&document)?;

        Notification::NoteSelected(Some(document)).publish(self.bus()).await;
        Ok(Some(note))
    }

    /// Replace the editor content.
    pub async fn save_content(&self, id: &str, content: Value) -> NotesResult<Option<Note>> {
        self.patch(id, [("content", content)]).await
    }

    /// Replace the drawing and, when given, its library.
    pub async fn save_drawing(
        &self,
        id: &str,
        excalidraw: &str,
        library: Option<&str>,
    ) -> NotesResult<Option<Note>> {
        let mut patch = vec![("excalidraw", Value::from(excalidraw))];
        if let Some(library) = library {
            patch.push(("excalidrawLibrary", Value::from(library)));
        }
        self.patch(id, patch).await
    }

    async fn patch<I>(&self, id: &str, fields: I) -> NotesResult<Option<Note>>
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let document = self.patch_document(id, fields).await?;
        document.as_ref().map(to_note).transpose()
    }

    async fn patch_document<I>(&self, id: &str, fields: I) -> NotesResult<Option<Document>>
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let patch: Fields = fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();

        let updated = self
            .client
            .update(NOTES_COLLECTION, WhereClause::by_id(id), patch)
            .await?;
        Ok(updated.into_iter().next())
    }

    /// Delete one note. Its children keep their `parentId` and become roots.
    ///
    /// Clears the selection if the removed note was selected.
    pub async fn remove(&self, id: &str) -> NotesResult<bool> {
        let removed = self
            .client
            .delete(NOTES_COLLECTION, WhereClause::by_id(id))
            .await?;

        if removed > 0 && self.selected_id().as_deref() == Some(id) {
            Notification::NoteSelected(None).publish(self.bus()).await;
        }
        Ok(removed > 0)
    }

    /// Select a note by id, or clear the selection with `None`.
    pub async fn select(&self, id: Option<&str>) -> NotesResult<Option<Note>> {
        let Some(id) = id else {
            Notification::NoteSelected(None).publish(self.bus()).await;
            return Ok(None);
        };

        let document = self
            .client
            .find_by_id(NOTES_COLLECTION, id)
            .await?
            .ok_or_else(|| NotesError::NotFound(id.to_string()))?;
        let note = to_note(&document)?;

        Notification::NoteSelected(Some(document)).publish(self.bus()).await;
        Ok(Some(note))
    }

    pub async fn request_pdf_export(&self) -> PublishReport {
        Notification::ExportPdf.publish(self.bus()).await
    }

    /// Publish every note to the search layer.
    ///
    /// Each entry's select action re-selects the note with its content as a string.
    pub async fn publish_search_snapshot(&self) -> NotesResult<PublishReport> {
        let documents = self.client.find(NOTES_COLLECTION, WhereClause::all()).await?;

        let data = documents
            .into_iter()
            .map(|document| {
                let mut entry = SearchEntry::selecting(document);
                if let Some(content) = entry.select.payload.get_mut("content") {
                    if !content.is_string() {
                        *content = Value::String(content.to_string());
                    }
                }
                entry
            })
            .collect();

        let snapshot = SearchSnapshot {
            data,
            options: SearchOptions::default(),
        };
        Ok(Notification::Search(snapshot).publish(self.bus()).await)
    }
}

impl Drop for NotesController {
    fn drop(&mut self) {
        self.detach();
    }
}
