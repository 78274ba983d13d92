//! Per-collection mutation lanes
//!
//! Every mutating store operation enters the lane of its collection and runs
//! its read-modify-write cycle while holding the lane. Lanes admit in FIFO
//! order (tokio's mutex is fair), so mutations on one collection apply in the
//! order they arrived. Lanes of different collections are independent.
//!
//! Each lane also carries a generation counter. A mutation records the
//! generation it observed on entry and advances it on commit; seeing a
//! different value at commit time means a write slipped past the lane.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, trace};

use super::error::{StorageError, StorageResult};

#[derive(Debug, Default)]
struct Lane {
    queue: Arc<Mutex<()>>,
    generation: AtomicU64,
}

impl Lane {
    fn commit_from(&self, collection: &str, observed: u64) -> StorageResult<u64> {
        let next = observed.wrapping_add(1);
        self.generation
            .compare_exchange(observed, next, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| next)
            .map_err(|actual| {
                error!(
                    "Collection '{}' moved from generation {} to {} during a mutation",
                    collection, observed, actual
                );
                StorageError::ConcurrentMutationConflict {
                    collection: collection.to_string(),
                }
            })
    }
}

/// Serializes mutations per collection.
#[derive(Debug, Default)]
pub struct MutationLanes {
    lanes: DashMap<String, Arc<Lane>>,
}

impl MutationLanes {
    /// No lanes yet; they are created on first use.
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, collection: &str) -> Arc<Lane> {
        if let Some(entry) = self.lanes.get(collection) {
            return Arc::clone(entry.value());
        }
        let entry = self.lanes.entry(collection.to_string()).or_default();
        Arc::clone(entry.value())
    }

    /// Wait for this collection's turn.
    ///
    /// The returned guard keeps the lane until it is committed or dropped.
    pub async fn admit(&self, collection: &str) -> LaneGuard {
        let lane = self.lane(collection);
        let permit = Arc::clone(&lane.queue).lock_owned().await;
        let observed = lane.generation.load(Ordering::Acquire);
        trace!("Admitted to lane '{}' at generation {}", collection, observed);

        LaneGuard {
            collection: collection.to_string(),
            lane,
            observed,
            _permit: permit,
        }
    }

    /// Committed mutations so far on a collection
    pub fn generation(&self, collection: &str) -> u64 {
        self.lanes
            .get(collection)
            .map(|entry| entry.value().generation.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Number of collections that have seen at least one mutation attempt
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// Whether no lane has been created yet
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[cfg(test)]
    fn advance_outside_lane(&self, collection: &str) {
        self.lane(collection)
            .generation
            .fetch_add(1, Ordering::AcqRel);
    }
}

/// Exclusive hold on a collection's lane.
#[derive(Debug)]
pub struct LaneGuard {
    collection: String,
    lane: Arc<Lane>,
    observed: u64,
    _permit: OwnedMutexGuard<()>,
}

impl LaneGuard {
    /// Collection this guard belongs to
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Generation observed on admission
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// Record a persisted mutation and release the lane.
    ///
    /// Returns the new generation.
    pub fn commit(self) -> StorageResult<u64> {
        self.lane.commit_from(&self.collection, self.observed)
    }
}
