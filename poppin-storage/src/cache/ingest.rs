//! Turning provider text into persisted records.

use std::sync::Arc;

use chrono::Utc;
use poppin_core::{normalize, PoppinResult, RecordIdentity, Timestamp};
use tracing::{debug, info};

use crate::{DocumentStore, WriteBatch};

/// Normalizes provider text, stamps every record with its partition and
/// provenance, and merge-upserts the lot as one batch.
#[derive(Clone)]
pub struct ContentIngestor {
    store: Arc<dyn DocumentStore>,
}

impl ContentIngestor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Ingest `raw` into `partition`, stamping records with the current time.
    ///
    /// Returns the number of records parsed, which counts merges into
    /// existing documents as well as new ones.
    ///
    /// # Errors
    /// `PoppinError::Parse` when `raw` holds no JSON array;
    /// `PoppinError::Store` when the batch write fails. Nothing is written
    /// in either case.
    pub async fn ingest(&self, partition: &str, raw: &str) -> PoppinResult<usize> {
        self.ingest_at(partition, raw, Utc::now()).await
    }

    /// Ingest `raw` into `partition`, stamping records with `fetched_at`.
    pub async fn ingest_at(
        &self,
        partition: &str,
        raw: &str,
        fetched_at: Timestamp,
    ) -> PoppinResult<usize> {
        let normalized = normalize(raw)?;
        if normalized.skipped > 0 {
            debug!(
                city = %partition,
                skipped = normalized.skipped,
                "Dropped non-object entries from provider answer"
            );
        }

        let count = normalized.len();
        if count == 0 {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        for mut record in normalized.records {
            let id = RecordIdentity::derive(partition, &record);
            record.stamp(partition, fetched_at);
            batch.upsert(id, record);
        }
        self.store.batch_write(batch).await?;

        info!(city = %partition, count, "Ingested events");
        Ok(count)
    }
}

impl std::fmt::Debug for ContentIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentIngestor").finish_non_exhaustive()
    }
}
