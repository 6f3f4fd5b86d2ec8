//! Clean-sweep replacement of a partition.
//!
//! Used only from background paths: between the delete and the ingest the
//! partition is empty, which a waiting request could observe.

use std::sync::Arc;

use poppin_core::{ContentDiscoveryProvider, PoppinResult};
use tracing::{debug, info};

use super::ingest::ContentIngestor;
use crate::{DocumentStore, WriteBatch};

/// Outcome of one clean sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Documents removed before repopulating.
    pub deleted: usize,
    /// Records parsed from the fresh provider answer.
    pub ingested: usize,
}

/// Deletes a partition's entire record set, then repopulates it.
#[derive(Debug, Clone)]
pub struct CleanSweepReplacer {
    ingestor: ContentIngestor,
}

impl CleanSweepReplacer {
    pub fn new(ingestor: ContentIngestor) -> Self {
        Self { ingestor }
    }

    fn store(&self) -> &Arc<dyn DocumentStore> {
        self.ingestor.store()
    }

    /// Delete every document in `partition` in one batch.
    pub async fn clear(&self, partition: &str) -> PoppinResult<usize> {
        let existing = self.store().query(partition).await?;
        if existing.is_empty() {
            return Ok(0);
        }

        let deleted = existing.len();
        let mut batch = WriteBatch::new();
        for doc in existing {
            batch.delete(doc.id);
        }
        self.store().batch_write(batch).await?;

        debug!(city = %partition, deleted, "Cleared partition");
        Ok(deleted)
    }

    /// Replace `partition` with exactly the records in `raw`.
    ///
    /// The delete does not depend on `raw` being usable: a parse failure
    /// still leaves the partition empty and surfaces as an error.
    pub async fn replace(&self, partition: &str, raw: &str) -> PoppinResult<usize> {
        let deleted = self.clear(partition).await?;
        let ingested = self.ingestor.ingest(partition, raw).await?;
        info!(city = %partition, deleted, ingested, "Replaced partition");
        Ok(ingested)
    }

    /// Clear `partition`, then ask `provider` for a fresh answer and ingest it.
    ///
    /// The provider call happens after the delete has committed.
    pub async fn refresh_from(
        &self,
        partition: &str,
        provider: &dyn ContentDiscoveryProvider,
    ) -> PoppinResult<SweepReport> {
        let deleted = self.clear(partition).await?;
        let raw = provider.query(partition).await?;
        let ingested = self.ingestor.ingest(partition, &raw).await?;

        info!(
            city = %partition,
            provider = provider.name(),
            deleted,
            ingested,
            "Clean sweep complete"
        );
        Ok(SweepReport { deleted, ingested })
    }
}
