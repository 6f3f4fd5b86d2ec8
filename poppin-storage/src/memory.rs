//! In-memory document store.
//!
//! Backs tests and the `POPPIN_STORE=memory` mode. Each batch is applied
//! while holding a single write guard, so readers never observe half of one.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use poppin_core::{EventRecord, PoppinResult, RecordIdentity, StoreError};

use crate::{CityStatus, DocumentStore, StoredDocument, WriteBatch};

/// Document store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    events: RwLock<BTreeMap<RecordIdentity, EventRecord>>,
    cities: RwLock<BTreeMap<String, CityStatus>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of event documents across all partitions.
    pub fn len(&self) -> PoppinResult<usize> {
        let events = self.events.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(events.len())
    }

    pub fn is_empty(&self) -> PoppinResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Fetch one document by identity.
    pub fn get(&self, id: &RecordIdentity) -> PoppinResult<Option<EventRecord>> {
        let events = self.events.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(events.get(id).cloned())
    }

    /// Insert a document verbatim, bypassing merge and stamping. Test seeding.
    pub fn insert_raw(&self, id: RecordIdentity, record: EventRecord) -> PoppinResult<()> {
        let mut events = self.events.write().map_err(|_| StoreError::LockPoisoned)?;
        events.insert(id, record);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn query(&self, partition: &str) -> PoppinResult<Vec<StoredDocument>> {
        let events = self.events.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(events
            .iter()
            .filter(|(_, record)| record.city() == Some(partition))
            .map(|(id, record)| StoredDocument {
                id: id.clone(),
                record: record.clone(),
            })
            .collect())
    }

    async fn batch_write(&self, batch: WriteBatch) -> PoppinResult<()> {
        let mut events = self.events.write().map_err(|_| StoreError::LockPoisoned)?;

        for id in batch.deletes() {
            events.remove(id);
        }
        for (id, record) in batch.upserts() {
            events
                .entry(id.clone())
                .and_modify(|existing| existing.merge_from(record))
                .or_insert_with(|| record.clone());
        }
        Ok(())
    }

    async fn upsert_city(&self, name: &str, status: CityStatus) -> PoppinResult<()> {
        let mut cities = self.cities.write().map_err(|_| StoreError::LockPoisoned)?;
        cities.insert(name.to_string(), status);
        Ok(())
    }

    async fn active_cities(&self) -> PoppinResult<Vec<String>> {
        let cities = self.cities.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(cities
            .iter()
            .filter(|(_, status)| **status == CityStatus::Active)
            .map(|(name, _)| name.clone())
            .collect())
    }
}
