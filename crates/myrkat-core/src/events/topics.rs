//! Well-known topics and their payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bus::{EventBus, PublishReport};
use crate::document::Document;

/// Request/reply topic served by the storage service
pub const STORAGE_REQUEST: &str = "storage:request";

/// A note was selected (payload: the note, or `null` to clear the selection)
pub const NOTE_SELECTED: &str = "note:selected";

/// The user asked to export the current note as PDF (payload: `null`)
pub const NOTE_EXPORT_PDF: &str = "note:export-pdf";

/// Indexable snapshot for the search layer (payload: [`SearchSnapshot`])
pub const SEARCH: &str = "search";

/// Fields the search layer indexes by default
pub const DEFAULT_SEARCH_KEYS: [&str; 2] = ["title", "content.content.text"];

/// Typed notification for one of the well-known publish topics.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Selection changed
    NoteSelected(Option<Document>),
    /// PDF export requested for the current note
    ExportPdf,
    /// New search snapshot
    Search(SearchSnapshot),
}

impl Notification {
    /// Topic this notification is published on
    pub fn topic(&self) -> &'static str {
        match self {
            Self::NoteSelected(_) => NOTE_SELECTED,
            Self::ExportPdf => NOTE_EXPORT_PDF,
            Self::Search(_) => SEARCH,
        }
    }

    /// Wire payload
    pub fn into_payload(self) -> Value {
        match self {
            Self::NoteSelected(Some(document)) => document.to_value(),
            Self::NoteSelected(None) | Self::ExportPdf => Value::Null,
            // SearchSnapshot only holds JSON-representable data
            Self::Search(snapshot) => serde_json::to_value(snapshot).unwrap_or(Value::Null),
        }
    }

    /// Publish on `bus`
    pub async fn publish(self, bus: &EventBus) -> PublishReport {
        let topic = self.topic();
        bus.publish(topic, self.into_payload()).await
    }
}

/// What to publish when a search hit is chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectAction {
    pub topic: String,
    pub payload: Value,
}

/// One indexable record; the document's fields are flattened next to `select`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    #[serde(flatten)]
    pub document: Document,
    pub select: SelectAction,
}

impl SearchEntry {
    /// Entry that re-selects `document` when chosen
    pub fn selecting(document: Document) -> Self {
        let select = SelectAction {
            topic: NOTE_SELECTED.to_string(),
            payload: document.to_value(),
        };
        Self { document, select }
    }
}

/// Search index options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub include_score: bool,
    pub keys: Vec<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            include_score: true,
            keys: DEFAULT_SEARCH_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Payload of [`SEARCH`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSnapshot {
    pub data: Vec<SearchEntry>,
    pub options: SearchOptions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Fields;
    use serde_json::json;

    #[test]
    fn test_topics() {
        assert_eq!(Notification::ExportPdf.topic(), "note:export-pdf");
        assert_eq!(Notification::NoteSelected(None).topic(), "note:selected");
        assert_eq!(Notification::NoteSelected(None).into_payload(), Value::Null);
    }

    #[test]
    fn test_search_snapshot_shape() {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), json!("A"));
        let document = Document::new("x1", 5, fields);

        let snapshot = SearchSnapshot {
            data: vec![SearchEntry::selecting(document)],
            options: SearchOptions::default(),
        };

        assert_eq!(
            Notification::Search(snapshot).into_payload(),
            json!({
                "data": [{
                    "id": "x1",
                    "createdAt": 5,
                    "updatedAt": 5,
                    "title": "A",
                    "select": {
                        "topic": "note:selected",
                        "payload": {"id": "x1", "createdAt": 5, "updatedAt": 5, "title": "A"}
                    }
                }],
                "options": {"includeScore": true, "keys": ["title", "content.content.text"]}
            })
        );
    }
}
