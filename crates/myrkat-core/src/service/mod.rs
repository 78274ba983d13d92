//! Storage Service
//!
//! Bridges the event bus to the [`CollectionStore`]: decodes envelopes arriving
//! on `storage:request`, runs them against the store and encodes the reply.
//! [`StorageClient`] is the typed caller side of the same exchange.

mod client;
mod request;

pub use client::{ClientError, StorageClient};
pub use request::{StorageOperation, StorageRequest};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::document::{Document, DocumentInput};
use crate::events::{EventBus, RequestHandler, STORAGE_REQUEST};
use crate::storage::{CollectionStore, StorageError, StorageResult};

/// Request handler for `storage:request`.
#[derive(Debug, Clone)]
pub struct StorageService {
    store: Arc<CollectionStore>,
}

impl StorageService {
    pub fn new(store: Arc<CollectionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CollectionStore> {
        &self.store
    }

    /// Install on `bus` as the `storage:request` handler.
    ///
    /// Returns whatever handler was there before.
    pub fn register(self: &Arc<Self>, bus: &EventBus) -> Option<Arc<dyn RequestHandler>> {
        let previous = bus.handle(STORAGE_REQUEST, Arc::clone(self) as Arc<dyn RequestHandler>);
        info!("Storage service registered on '{}'", STORAGE_REQUEST);
        previous
    }

    /// Remove the `storage:request` handler from `bus`.
    pub fn unregister(bus: &EventBus) -> bool {
        let removed = bus.unhandle(STORAGE_REQUEST);
        if removed {
            info!("Storage service unregistered from '{}'", STORAGE_REQUEST);
        }
        removed
    }

    /// Run one request against the store.
    ///
    /// Replies: `find`/`update` give an array, `insert` mirrors its input,
    /// `delete` gives a count and `replaceAll` gives `null`.
    pub async fn execute(&self, mut request: StorageRequest) -> StorageResult<Value> {
        let operation = request.operation()?;
        debug!("storage:request {} on '{}'", operation, request.collection);

        let collection = request.collection.clone();
        match operation {
            StorageOperation::Find => {
                let filter = request.filter.take().unwrap_or_default();
                let documents = self.store.find(&collection, &filter).await?;
                Ok(serde_json::to_value(documents)?)
            }
            StorageOperation::Insert => {
                let data = request.take_data()?;
                let input: DocumentInput = serde_json::from_value(data).map_err(|_| {
                    StorageError::invalid_request(
                        "insert data must be an object or an array of objects",
                    )
                })?;
                let created = self.store.insert(&collection, input).await?;
                Ok(serde_json::to_value(created)?)
            }
            StorageOperation::Update => {
                let filter = request.require_filter()?.clone();
                let patch = match request.take_data()? {
                    Value::Object(patch) => patch,
                    _ => {
                        return Err(StorageError::invalid_request(
                            "update data must be an object",
                        ))
                    }
                };
                let updated = self.store.update(&collection, &filter, &patch).await?;
                Ok(serde_json::to_value(updated)?)
            }
            StorageOperation::Delete => {
                let filter = request.require_filter()?;
                let removed = self.store.delete(&collection, filter).await?;
                Ok(Value::from(removed))
            }
            StorageOperation::ReplaceAll => {
                let data = request.take_data()?;
                let documents: Vec<Document> = serde_json::from_value(data).map_err(|e| {
                    StorageError::invalid_request(format!(
                        "replaceAll data must be an array of documents: {}",
                        e
                    ))
                })?;
                self.store.replace_all(&collection, documents).await?;
                Ok(Value::Null)
            }
        }
    }
}

#[async_trait]
impl RequestHandler for StorageService {
    async fn handle(&self, _topic: &str, payload: Value) -> anyhow::Result<Value> {
        let request = StorageRequest::from_value(payload)?;
        Ok(self.execute(request).await?)
    }
}
