//! Poppin Storage - Document Store and Refresh Engine
//!
//! Defines the document store abstraction, an in-memory and an LMDB-backed
//! implementation, and the cache engine in [`cache`] that decides when the
//! stored events for a place are served, replaced, or refreshed in the
//! background.

pub mod cache;
pub mod lmdb;
pub mod memory;

pub use cache::{
    classify, classify_at, BackgroundTrigger, ChannelGuard, ChannelStatus, CleanSweepReplacer,
    ContentIngestor, ConsumerStats, Freshness, InProcessTrigger, RefreshConsumer,
    RefreshDispatcher, RefreshMessage, RefreshPath, Resolution, StaleReason, SweepReport,
};
pub use lmdb::LmdbDocumentStore;
pub use memory::InMemoryDocumentStore;

use async_trait::async_trait;
use poppin_core::{EventRecord, PoppinResult, RecordIdentity};
use serde::{Deserialize, Serialize};

// ============================================================================
// WRITE BATCH
// ============================================================================

/// A document as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: RecordIdentity,
    pub record: EventRecord,
}

/// A set of writes committed all-or-nothing.
///
/// Deletes are applied before upserts. Upserts merge into any existing
/// document with the same identity; within one batch a later upsert of the
/// same identity merges over an earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    upserts: Vec<(RecordIdentity, EventRecord)>,
    deletes: Vec<RecordIdentity>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a merge-upsert.
    pub fn upsert(&mut self, id: RecordIdentity, record: EventRecord) -> &mut Self {
        self.upserts.push((id, record));
        self
    }

    /// Queue a delete. Deleting a missing document is a no-op.
    pub fn delete(&mut self, id: RecordIdentity) -> &mut Self {
        self.deletes.push(id);
        self
    }

    pub fn upserts(&self) -> &[(RecordIdentity, EventRecord)] {
        &self.upserts
    }

    pub fn deletes(&self) -> &[RecordIdentity] {
        &self.deletes
    }

    /// Total number of queued operations.
    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

// ============================================================================
// CITY REGISTRY
// ============================================================================

/// Whether the periodic sweep should refresh a city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CityStatus {
    Active,
    Inactive,
}

/// A city registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRecord {
    pub name: String,
    pub status: CityStatus,
}

// ============================================================================
// DOCUMENT STORE TRAIT
// ============================================================================

/// Document database holding event documents keyed by identity and grouped
/// by their `city` field.
///
/// Implementations must apply each [`WriteBatch`] atomically.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents whose `city` equals `partition`, ordered by identity.
    async fn query(&self, partition: &str) -> PoppinResult<Vec<StoredDocument>>;

    /// Commit a batch of upserts and deletes as one unit.
    async fn batch_write(&self, batch: WriteBatch) -> PoppinResult<()>;

    /// Create or update a city registry entry.
    async fn upsert_city(&self, name: &str, status: CityStatus) -> PoppinResult<()>;

    /// Names of cities flagged active, sorted.
    async fn active_cities(&self) -> PoppinResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_batch_counts_operations() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch
            .upsert(RecordIdentity::from_raw("a"), EventRecord::new())
            .delete(RecordIdentity::from_raw("b"))
            .delete(RecordIdentity::from_raw("c"));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.upserts().len(), 1);
        assert_eq!(batch.deletes().len(), 2);
    }

    #[test]
    fn test_city_status_serializes_lowercase() {
        let json = serde_json::to_string(&CityStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");
        let status: CityStatus = serde_json::from_str("\"inactive\"").unwrap();
        assert_eq!(status, CityStatus::Inactive);
    }
}
