//! Storage Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Error type for collection store operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Collection '{collection}' is corrupt: {reason}")]
    CorruptCollection { collection: String, reason: String },

    #[error("Failed to persist collection '{collection}': {reason}")]
    PersistenceFailure { collection: String, reason: String },

    #[error("Failed to initialize storage at {}: {reason}", path.display())]
    Initialization { path: PathBuf, reason: String },

    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid collection name: '{0}'")]
    InvalidCollectionName(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Duplicate id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("Concurrent mutation detected on collection '{collection}'")]
    ConcurrentMutationConflict { collection: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Create a corrupt-collection error
    pub fn corrupt<C: Into<String>, R: ToString>(collection: C, reason: R) -> Self {
        Self::CorruptCollection {
            collection: collection.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a persistence error
    pub fn persistence<C: Into<String>, R: ToString>(collection: C, reason: R) -> Self {
        Self::PersistenceFailure {
            collection: collection.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported<S: Into<String>>(operation: S) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    /// Create an invalid-request error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Stable machine-readable code, logged by the CLI when a command fails
    pub fn code(&self) -> &'static str {
        match self {
            Self::CorruptCollection { .. } => "corrupt_collection",
            Self::PersistenceFailure { .. } => "persistence_failure",
            Self::Initialization { .. } => "initialization",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidCollectionName(_) => "invalid_collection_name",
            Self::InvalidDocument(_) => "invalid_document",
            Self::DuplicateId { .. } => "duplicate_id",
            Self::ConcurrentMutationConflict { .. } => "concurrent_mutation_conflict",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Check if the error indicates on-disk corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptCollection { .. })
    }

    /// Check if the caller sent something the store refuses to act on
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperation { .. }
                | Self::InvalidRequest(_)
                | Self::InvalidCollectionName(_)
                | Self::InvalidDocument(_)
                | Self::DuplicateId { .. }
        )
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
