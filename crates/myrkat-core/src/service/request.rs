//! Storage request envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, DocumentInput, Fields, WhereClause};
use crate::storage::{StorageError, StorageResult};

/// Operations understood by the storage service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    Find,
    Insert,
    Update,
    Delete,
    ReplaceAll,
}

impl StorageOperation {
    /// Parse a wire name. `writeTable` and `writeFile` are accepted for `replaceAll`.
    pub fn parse(name: &str) -> StorageResult<Self> {
        match name {
            "find" => Ok(Self::Find),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "replaceAll" | "writeTable" | "writeFile" => Ok(Self::ReplaceAll),
            other => Err(StorageError::unsupported(other)),
        }
    }

    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ReplaceAll => "replaceAll",
        }
    }
}

impl std::fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `storage:request`.
///
/// `operation` stays a string so unknown names reach the service and come back
/// as [`StorageError::UnsupportedOperation`] rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRequest {
    pub operation: String,

    #[serde(alias = "tableName", alias = "fileName")]
    pub collection: String,

    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereClause>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StorageRequest {
    fn new(operation: StorageOperation, collection: impl Into<String>) -> Self {
        Self {
            operation: operation.as_str().to_string(),
            collection: collection.into(),
            filter: None,
            data: None,
        }
    }

    /// `find` request
    pub fn find(collection: impl Into<String>, filter: WhereClause) -> Self {
        Self::new(StorageOperation::Find, collection).with_filter(filter)
    }

    /// `insert` request for one record or a batch
    pub fn insert(collection: impl Into<String>, input: &DocumentInput) -> StorageResult<Self> {
        Ok(Self::new(StorageOperation::Insert, collection).with_data(serde_json::to_value(input)?))
    }

    /// `update` request
    pub fn update(collection: impl Into<String>, filter: WhereClause, patch: Fields) -> Self {
        Self::new(StorageOperation::Update, collection)
            .with_filter(filter)
            .with_data(Value::Object(patch))
    }

    /// `delete` request
    pub fn delete(collection: impl Into<String>, filter: WhereClause) -> Self {
        Self::new(StorageOperation::Delete, collection).with_filter(filter)
    }

    /// `replaceAll` request
    pub fn replace_all(
        collection: impl Into<String>,
        documents: &[Document],
    ) -> StorageResult<Self> {
        Ok(Self::new(StorageOperation::ReplaceAll, collection)
            .with_data(serde_json::to_value(documents)?))
    }

    /// Builder-style: set the where-clause
    #[must_use]
    pub fn with_filter(mut self, filter: WhereClause) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Builder-style: set the data field
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Decode an envelope received over the bus.
    pub fn from_value(value: Value) -> StorageResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| StorageError::invalid_request(format!("malformed storage request: {}", e)))
    }

    /// Encode for the bus.
    pub fn to_value(&self) -> StorageResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parsed operation
    pub fn operation(&self) -> StorageResult<StorageOperation> {
        StorageOperation::parse(&self.operation)
    }

    pub(crate) fn require_filter(&self) -> StorageResult<&WhereClause> {
        self.filter.as_ref().ok_or_else(|| {
            StorageError::invalid_request(format!("'{}' requires a where-clause", self.operation))
        })
    }

    pub(crate) fn take_data(&mut self) -> StorageResult<Value> {
        self.data.take().ok_or_else(|| {
            StorageError::invalid_request(format!("'{}' requires data", self.operation))
        })
    }
}
