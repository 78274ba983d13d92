//! Document model
//!
//! A [`Document`] is one stored record: three store-managed fields (`id`,
//! `createdAt`, `updatedAt`) plus arbitrary caller-defined JSON fields.
//! [`WhereClause`] selects documents by strict field equality.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::storage::{StorageError, StorageResult};

/// Field holding the document identifier
pub const ID_FIELD: &str = "id";

/// Field holding the creation timestamp (seconds)
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Field holding the last-update timestamp (seconds)
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Fields owned by the store; callers cannot set them through insert or update.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// Caller-defined document fields
pub type Fields = Map<String, Value>;

// ============================================================================
// Document
// ============================================================================

/// One stored record.
///
/// Serializes as a single flat JSON object, e.g.
/// `{"id": "...", "createdAt": 1700000000, "updatedAt": 1700000000, "title": "A"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within its collection; immutable once assigned
    pub id: String,

    /// Seconds since the Unix epoch, set on insert
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,

    /// Seconds since the Unix epoch, refreshed on every update
    #[serde(rename = "updatedAt", default)]
    pub updated_at: i64,

    /// Everything else
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    /// Create a document with explicit store-managed fields.
    pub fn new(id: impl Into<String>, created_at: i64, fields: Fields) -> Self {
        Self {
            id: id.into(),
            created_at,
            updated_at: created_at,
            fields,
        }
    }

    /// Turn caller input into a stored document.
    ///
    /// Keeps a caller-supplied non-empty string `id`, otherwise generates a UUID v4.
    /// Caller-supplied timestamps are discarded and both are set to `now`.
    pub fn stamp(mut fields: Fields, now: i64) -> StorageResult<Self> {
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id,
            None | Some(Value::Null) => Uuid::new_v4().to_string(),
            Some(Value::String(_)) => Uuid::new_v4().to_string(),
            Some(other) => {
                return Err(StorageError::InvalidDocument(format!(
                    "id must be a string, got {}",
                    other
                )))
            }
        };
        fields.remove(CREATED_AT_FIELD);
        fields.remove(UPDATED_AT_FIELD);

        Ok(Self::new(id, now, fields))
    }

    /// Read a field, including the store-managed ones.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => Some(Value::String(self.id.clone())),
            CREATED_AT_FIELD => Some(Value::from(self.created_at)),
            UPDATED_AT_FIELD => Some(Value::from(self.updated_at)),
            _ => self.fields.get(field).cloned(),
        }
    }

    /// Read a caller-defined string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Whether `field` is present and strictly equal to `expected`.
    pub fn field_equals(&self, field: &str, expected: &Value) -> bool {
        match field {
            ID_FIELD => expected.as_str() == Some(self.id.as_str()),
            CREATED_AT_FIELD => number_equals(expected, self.created_at),
            UPDATED_AT_FIELD => number_equals(expected, self.updated_at),
            _ => self
                .fields
                .get(field)
                .is_some_and(|actual| json_equals(actual, expected)),
        }
    }

    /// Merge `patch` over the caller fields. Reserved fields are skipped.
    ///
    /// Returns `true` if any field value changed.
    pub fn apply_patch(&mut self, patch: &Fields) -> bool {
        let mut changed = false;
        for (key, value) in patch {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if self.fields.get(key) != Some(value) {
                self.fields.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Refresh `updatedAt` after an update.
    ///
    /// An effective change always moves `updatedAt` forward, even when several
    /// updates land within the same second.
    pub fn touch(&mut self, now: i64, changed: bool) {
        let floor = if changed {
            self.updated_at.saturating_add(1)
        } else {
            self.updated_at
        };
        self.updated_at = now.max(floor).max(self.created_at);
    }

    /// Serialize into a JSON object.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        object.insert(CREATED_AT_FIELD.to_string(), Value::from(self.created_at));
        object.insert(UPDATED_AT_FIELD.to_string(), Value::from(self.updated_at));
        Value::Object(object)
    }
}

/// Strict JSON equality; numbers compare by value so `1` equals `1.0`.
fn json_equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => actual == expected,
    }
}

fn number_equals(expected: &Value, actual: i64) -> bool {
    json_equals(&Value::from(actual), expected)
}

// ============================================================================
// Where clause
// ============================================================================

/// Equality-conjunction filter.
///
/// A document matches iff every key in the clause is present on the document
/// with an equal value. The empty clause matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhereClause(Fields);

impl WhereClause {
    /// Clause matching every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Clause selecting one id
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().eq(ID_FIELD, Value::String(id.into()))
    }

    /// Builder-style: require `field == value`
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Whether the clause has no conditions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of conditions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Test a document against the clause
    pub fn matches(&self, document: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| document.field_equals(field, expected))
    }

    /// Conditions as a JSON map
    pub fn as_fields(&self) -> &Fields {
        &self.0
    }
}

impl From<Fields> for WhereClause {
    fn from(fields: Fields) -> Self {
        Self(fields)
    }
}

// ============================================================================
// Insert shapes
// ============================================================================

/// Input to insert: one record or an ordered batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentInput {
    /// Ordered batch; output is a list in the same order
    Many(Vec<Fields>),
    /// Single record; output is a single document
    One(Fields),
}

impl DocumentInput {
    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            Self::Many(records) => records.len(),
            Self::One(_) => 1,
        }
    }

    /// Whether the input holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of insert, mirroring the shape of the [`DocumentInput`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsertOutput {
    /// Created documents for a batch input
    Many(Vec<Document>),
    /// Created document for a single input
    One(Document),
}

impl InsertOutput {
    /// Flatten into a list regardless of shape
    pub fn into_vec(self) -> Vec<Document> {
        match self {
            Self::Many(documents) => documents,
            Self::One(document) => vec![document],
        }
    }

    /// The single created document, if the input was a single record
    pub fn into_one(self) -> Option<Document> {
        match self {
            Self::One(document) => Some(document),
            Self::Many(_) => None,
        }
    }
}
