//! Collection storage
//!
//! - [`CollectionStore`]: collection-scoped CRUD with equality filtering
//! - [`CollectionBackend`]: where whole collections live ([`FileBackend`], [`MemoryBackend`])
//! - [`MutationLanes`]: one FIFO lane per collection so read-modify-write cycles never interleave

pub mod backend;
pub mod error;
pub mod lanes;
pub mod store;

pub use backend::{CollectionBackend, FileBackend, MemoryBackend, COLLECTION_EXTENSION};
pub use error::{StorageError, StorageResult};
pub use lanes::{LaneGuard, MutationLanes};
pub use store::{validate_collection_name, Clock, CollectionStore};
