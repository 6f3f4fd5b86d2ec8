//! LMDB-backed document store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to persist event documents
//! across restarts.
//!
//! # Layout
//!
//! - `events`: identity -> JSON document
//! - `cities`: city name -> JSON [`CityRecord`]
//!
//! # Atomicity
//!
//! Every [`WriteBatch`] is applied inside one LMDB write transaction. A
//! failure anywhere aborts the transaction, so a batch is either fully
//! visible or not at all.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RwTxn};
use poppin_core::{Document, EventRecord, PoppinResult, RecordIdentity, StoreError};
use tracing::warn;

use crate::{CityRecord, CityStatus, DocumentStore, StoredDocument, WriteBatch};

const EVENTS_DB: &str = "events";
const CITIES_DB: &str = "cities";

/// Document store persisted in an LMDB environment.
pub struct LmdbDocumentStore {
    path: PathBuf,
    env: Env,
    events: Database<Str, Bytes>,
    cities: Database<Str, Bytes>,
}

impl LmdbDocumentStore {
    /// Open (or create) a store under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the map in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> PoppinResult<Self> {
        let path = path.as_ref();
        let open_err = |reason: String| StoreError::Open {
            path: path.display().to_string(),
            reason,
        };

        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| open_err(format!("map size of {} MB overflows", max_size_mb)))?;

        std::fs::create_dir_all(path).map_err(|e| open_err(e.to_string()))?;

        // SAFETY: the environment is opened once per path by this process and
        // the map is never accessed outside heed's transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(2)
                .open(path)
        }
        .map_err(|e| open_err(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(|e| open_err(e.to_string()))?;
        let events = env
            .create_database(&mut wtxn, Some(EVENTS_DB))
            .map_err(|e| open_err(e.to_string()))?;
        let cities = env
            .create_database(&mut wtxn, Some(CITIES_DB))
            .map_err(|e| open_err(e.to_string()))?;
        wtxn.commit().map_err(|e| open_err(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            env,
            events,
            cities,
        })
    }

    fn decode_record(bytes: &[u8]) -> Result<EventRecord, StoreError> {
        serde_json::from_slice::<Document>(bytes)
            .map(EventRecord::from_document)
            .map_err(|e| StoreError::Serialization {
                reason: e.to_string(),
            })
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })
    }

    fn apply(&self, wtxn: &mut RwTxn<'_>, batch: &WriteBatch) -> Result<(), StoreError> {
        let failed = |reason: String| StoreError::BatchFailed {
            operations: batch.len(),
            reason,
        };

        for id in batch.deletes() {
            self.events
                .delete(wtxn, id.as_str())
                .map_err(|e| failed(e.to_string()))?;
        }

        for (id, record) in batch.upserts() {
            let merged = match self
                .events
                .get(wtxn, id.as_str())
                .map_err(|e| failed(e.to_string()))?
            {
                Some(bytes) => {
                    let mut existing = Self::decode_record(bytes)?;
                    existing.merge_from(record);
                    existing
                }
                None => record.clone(),
            };
            let bytes = Self::encode(&merged)?;
            self.events
                .put(wtxn, id.as_str(), &bytes)
                .map_err(|e| failed(e.to_string()))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for LmdbDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbDocumentStore")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for LmdbDocumentStore {
    async fn query(&self, partition: &str) -> PoppinResult<Vec<StoredDocument>> {
        let read_err = |reason: String| StoreError::ReadFailed {
            partition: partition.to_string(),
            reason,
        };

        let rtxn = self.env.read_txn().map_err(|e| read_err(e.to_string()))?;
        let iter = self.events.iter(&rtxn).map_err(|e| read_err(e.to_string()))?;

        let own_prefix = RecordIdentity::partition_prefix(partition);
        let mut docs = Vec::new();
        for entry in iter {
            let (key, bytes) = entry.map_err(|e| read_err(e.to_string()))?;
            let record = match Self::decode_record(bytes) {
                Ok(record) => record,
                // A corrupt document keyed under another city must not break this lookup.
                Err(e) if !key.starts_with(&own_prefix) => {
                    warn!(city = %partition, key, error = %e, "Skipping undecodable document");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if record.city() == Some(partition) {
                docs.push(StoredDocument {
                    id: RecordIdentity::from_raw(key),
                    record,
                });
            }
        }
        Ok(docs)
    }

    async fn batch_write(&self, batch: WriteBatch) -> PoppinResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut wtxn = self.env.write_txn().map_err(|e| StoreError::BatchFailed {
            operations: batch.len(),
            reason: e.to_string(),
        })?;

        // Dropping the transaction on error aborts it.
        self.apply(&mut wtxn, &batch)?;

        wtxn.commit().map_err(|e| StoreError::BatchFailed {
            operations: batch.len(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn upsert_city(&self, name: &str, status: CityStatus) -> PoppinResult<()> {
        let write_err = |reason: String| StoreError::WriteFailed { reason };
        let bytes = Self::encode(&CityRecord {
            name: name.to_string(),
            status,
        })?;

        let mut wtxn = self.env.write_txn().map_err(|e| write_err(e.to_string()))?;
        self.cities
            .put(&mut wtxn, name, &bytes)
            .map_err(|e| write_err(e.to_string()))?;
        wtxn.commit().map_err(|e| write_err(e.to_string()))?;
        Ok(())
    }

    async fn active_cities(&self) -> PoppinResult<Vec<String>> {
        let read_err = |reason: String| StoreError::ReadFailed {
            partition: CITIES_DB.to_string(),
            reason,
        };

        let rtxn = self.env.read_txn().map_err(|e| read_err(e.to_string()))?;
        let iter = self.cities.iter(&rtxn).map_err(|e| read_err(e.to_string()))?;

        let mut active = Vec::new();
        for entry in iter {
            let (_, bytes) = entry.map_err(|e| read_err(e.to_string()))?;
            let city: CityRecord =
                serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
                    reason: e.to_string(),
                })?;
            if city.status == CityStatus::Active {
                active.push(city.name);
            }
        }
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poppin_core::{PoppinError, FIELD_CITY, FIELD_DESCRIPTION, FIELD_TITLE};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, LmdbDocumentStore) {
        let dir = TempDir::new().unwrap();
        let store = LmdbDocumentStore::open(dir.path(), 16).unwrap();
        (dir, store)
    }

    fn doc(city: &str, title: &str) -> EventRecord {
        EventRecord::new()
            .with_field(FIELD_CITY, city)
            .with_field(FIELD_TITLE, title)
    }

    #[tokio::test]
    async fn test_batch_round_trip_and_partition_filter() {
        let (_dir, store) = open_store();
        let mut batch = WriteBatch::new();
        batch
            .upsert(RecordIdentity::from_raw("Testville_A_X"), doc("Testville", "A"))
            .upsert(RecordIdentity::from_raw("Testville_B_Y"), doc("Testville", "B"))
            .upsert(RecordIdentity::from_raw("Other_C_Z"), doc("Other", "C"));
        store.batch_write(batch).await.unwrap();

        let docs = store.query("Testville").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id.as_str(), "Testville_A_X");
        assert_eq!(docs[1].record.title(), Some("B"));
    }

    #[tokio::test]
    async fn test_upsert_merges_existing_fields() {
        let (_dir, store) = open_store();
        let id = RecordIdentity::from_raw("Testville_Gig_Hall");

        let mut first = WriteBatch::new();
        first.upsert(id.clone(), doc("Testville", "Gig").with_field("ticketUrl", "https://t"));
        store.batch_write(first).await.unwrap();

        let mut second = WriteBatch::new();
        second.upsert(
            id.clone(),
            doc("Testville", "Gig").with_field(FIELD_DESCRIPTION, "fresh"),
        );
        store.batch_write(second).await.unwrap();

        let docs = store.query("Testville").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].record.description(), Some("fresh"));
        assert_eq!(docs[0].record.get_str("ticketUrl"), Some("https://t"));
    }

    #[tokio::test]
    async fn test_delete_batch_empties_partition() {
        let (_dir, store) = open_store();
        let mut batch = WriteBatch::new();
        batch
            .upsert(RecordIdentity::from_raw("a"), doc("Testville", "A"))
            .upsert(RecordIdentity::from_raw("b"), doc("Testville", "B"));
        store.batch_write(batch).await.unwrap();

        let mut deletes = WriteBatch::new();
        for stored in store.query("Testville").await.unwrap() {
            deletes.delete(stored.id);
        }
        store.batch_write(deletes).await.unwrap();

        assert!(store.query("Testville").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = LmdbDocumentStore::open(dir.path(), 16).unwrap();
            let mut batch = WriteBatch::new();
            batch.upsert(RecordIdentity::from_raw("a"), doc("Testville", "A"));
            store.batch_write(batch).await.unwrap();
            store.upsert_city("Testville", CityStatus::Active).await.unwrap();
        }

        let reopened = LmdbDocumentStore::open(dir.path(), 16).unwrap();
        assert_eq!(reopened.query("Testville").await.unwrap().len(), 1);
        assert_eq!(
            reopened.active_cities().await.unwrap(),
            vec!["Testville".to_string()]
        );
    }

    #[test]
    fn test_open_rejects_overflowing_map_size() {
        let dir = TempDir::new().unwrap();
        let err = LmdbDocumentStore::open(dir.path(), usize::MAX).unwrap_err();
        assert!(matches!(err, PoppinError::Store(StoreError::Open { .. })));
    }

    #[tokio::test]
    async fn test_corrupt_document_only_fails_its_own_partition() {
        let (_dir, store) = open_store();
        let mut batch = WriteBatch::new();
        batch.upsert(
            RecordIdentity::from_raw("Testville_Gig_Hall"),
            doc("Testville", "Gig"),
        );
        store.batch_write(batch).await.unwrap();

        let mut wtxn = store.env.write_txn().unwrap();
        store
            .events
            .put(&mut wtxn, "Otherville_Broken_Doc", b"not json".as_slice())
            .unwrap();
        wtxn.commit().unwrap();

        assert_eq!(store.query("Testville").await.unwrap().len(), 1);
        let err = store.query("Otherville").await.unwrap_err();
        assert!(matches!(
            err,
            PoppinError::Store(StoreError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_active_cities_excludes_inactive() {
        let (_dir, store) = open_store();
        store.upsert_city("Braunschweig", CityStatus::Active).await.unwrap();
        store.upsert_city("Hannover", CityStatus::Inactive).await.unwrap();

        assert_eq!(
            store.active_cities().await.unwrap(),
            vec!["Braunschweig".to_string()]
        );
    }
}
