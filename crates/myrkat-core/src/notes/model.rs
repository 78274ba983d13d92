//! Note view over stored documents

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, Fields};

/// Title given to freshly created notes
pub const UNTITLED: &str = "Untitled";

/// Editor content of a freshly created note: one empty paragraph, as a JSON string
pub const EMPTY_CONTENT: &str = r#"[{ "type": "paragraph", "content": "" }]"#;

/// A document from the `notes` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,

    #[serde(default)]
    pub created_at: i64,

    #[serde(default)]
    pub updated_at: i64,

    #[serde(default)]
    pub title: String,

    /// Editor blocks; stored either as JSON or as a JSON string
    #[serde(default)]
    pub content: Value,

    #[serde(default)]
    pub parent_id: Option<String>,

    /// Drawing elements, as a JSON string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excalidraw: Option<String>,

    /// Drawing library, as a JSON string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excalidraw_library: Option<String>,
}

impl Note {
    /// Read a note out of a stored document.
    pub fn from_document(document: &Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(document.to_value())
    }

    /// Parent id, treating an empty string as no parent
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|parent| !parent.is_empty())
    }

    /// Content as a string, serializing structured content
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Fields inserted for a new note under `parent_id`.
pub fn untitled(parent_id: Option<&str>) -> Fields {
    let mut fields = Fields::new();
    fields.insert("title".to_string(), Value::from(UNTITLED));
    fields.insert(
        "parentId".to_string(),
        parent_id.map_or(Value::Null, Value::from),
    );
    fields.insert("content".to_string(), Value::from(EMPTY_CONTENT));
    fields.insert("excalidraw".to_string(), Value::from(""));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_stored_document() {
        let document: Document = serde_json::from_value(json!({
            "id": "x1",
            "createdAt": 1,
            "updatedAt": 2,
            "title": "Groceries",
            "content": [{"type": "paragraph"}],
            "parentId": null,
            "excalidrawLibrary": "[]"
        }))
        .unwrap();

        let note = Note::from_document(&document).unwrap();

        assert_eq!(note.title, "Groceries");
        assert_eq!(note.parent(), None);
        assert_eq!(note.excalidraw, None);
        assert_eq!(note.excalidraw_library.as_deref(), Some("[]"));
        assert_eq!(note.content_text(), r#"[{"type":"paragraph"}]"#);
    }

    #[test]
    fn test_untitled_fields() {
        let fields = untitled(Some("p1"));

        assert_eq!(fields["title"], json!("Untitled"));
        assert_eq!(fields["parentId"], json!("p1"));
        assert_eq!(fields["excalidraw"], json!(""));
        assert_eq!(untitled(None)["parentId"], Value::Null);
    }
}
