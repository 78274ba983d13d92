//! Typed caller side of `storage:request`

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use super::request::StorageRequest;
use crate::document::{Document, DocumentInput, Fields, WhereClause};
use crate::events::{BusError, EventBus, STORAGE_REQUEST};
use crate::storage::StorageError;

/// Errors seen by [`StorageClient`] callers
#[derive(Error, Debug)]
pub enum ClientError {
    /// The store refused or failed the operation
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The request never reached a storage handler, or the handler failed
    /// with something other than a [`StorageError`]
    #[error(transparent)]
    Bus(BusError),

    /// The reply did not have the expected shape
    #[error("Failed to decode '{operation}' reply: {source}")]
    Codec {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<BusError> for ClientError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Handler { topic, source } => match source.downcast::<StorageError>() {
                Ok(storage) => Self::Storage(storage),
                Err(source) => Self::Bus(BusError::Handler { topic, source }),
            },
            other => Self::Bus(other),
        }
    }
}

impl ClientError {
    /// The underlying storage error, if that is what failed
    pub fn as_storage(&self) -> Option<&StorageError> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

/// Sends storage requests over the bus and decodes the replies.
#[derive(Debug, Clone)]
pub struct StorageClient {
    bus: EventBus,
}

impl StorageClient {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: StorageRequest,
    ) -> Result<T, ClientError> {
        trace!("Sending {} for '{}'", operation, request.collection);
        let reply = self.bus.request(STORAGE_REQUEST, request.to_value()?).await?;
        serde_json::from_value(reply).map_err(|source| ClientError::Codec { operation, source })
    }

    pub async fn find(
        &self,
        collection: &str,
        filter: WhereClause,
    ) -> Result<Vec<Document>, ClientError> {
        self.send("find", StorageRequest::find(collection, filter)).await
    }

    pub async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, ClientError> {
        let found = self.find(collection, WhereClause::by_id(id)).await?;
        Ok(found.into_iter().next())
    }

    pub async fn insert_one(
        &self,
        collection: &str,
        fields: Fields,
    ) -> Result<Document, ClientError> {
        let request = StorageRequest::insert(collection, &DocumentInput::One(fields))?;
        self.send("insert", request).await
    }

    pub async fn insert_many(
        &self,
        collection: &str,
        records: Vec<Fields>,
    ) -> Result<Vec<Document>, ClientError> {
        let request = StorageRequest::insert(collection, &DocumentInput::Many(records))?;
        self.send("insert", request).await
    }

    pub async fn update(
        &self,
        collection: &str,
        filter: WhereClause,
        patch: Fields,
    ) -> Result<Vec<Document>, ClientError> {
        self.send("update", StorageRequest::update(collection, filter, patch)).await
    }

    pub async fn delete(
        &self,
        collection: &str,
        filter: WhereClause,
    ) -> Result<usize, ClientError> {
        self.send("delete", StorageRequest::delete(collection, filter)).await
    }

    pub async fn replace_all(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<(), ClientError> {
        let request = StorageRequest::replace_all(collection, documents)?;
        let _: Value = self.send("replaceAll", request).await?;
        Ok(())
    }
}
