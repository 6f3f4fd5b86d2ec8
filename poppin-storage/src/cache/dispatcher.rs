//! Per-lookup refresh decision.
//!
//! | stored records | force | freshness | action                                   |
//! |----------------|-------|-----------|------------------------------------------|
//! | none           | any   | absent    | fetch + merge ingest now, re-read        |
//! | some           | true  | any       | fetch + merge ingest now, re-read        |
//! | some           | false | stale     | serve stored, publish background refresh |
//! | some           | false | fresh     | serve stored                             |
//!
//! Output is always sorted by `startTime`.

use std::sync::Arc;

use poppin_core::{sort_by_start_time, ContentDiscoveryProvider, EventRecord, PoppinResult};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::freshness::{classify, Freshness};
use super::ingest::ContentIngestor;
use super::trigger::{BackgroundTrigger, ChannelGuard};
use crate::DocumentStore;

/// Which branch a lookup took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPath {
    /// The provider was queried while the caller waited. `ingested` is zero
    /// when the provider or the parse failed.
    Synchronous { ingested: usize },
    /// Stored records were stale; a background refresh was scheduled.
    ServedStale,
    /// Stored records were fresh.
    ServedFresh,
}

/// Result of [`RefreshDispatcher::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Records to return, sorted by `startTime`.
    pub events: Vec<EventRecord>,
    pub path: RefreshPath,
    /// Classification of the records as first read.
    pub freshness: Freshness,
}

/// Chooses between serving, synchronously refreshing, and
/// serving stale while refreshing in the background.
#[derive(Clone)]
pub struct RefreshDispatcher {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn ContentDiscoveryProvider>,
    trigger: Arc<dyn BackgroundTrigger>,
    ingestor: ContentIngestor,
    channel_guard: Arc<ChannelGuard>,
}

impl RefreshDispatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn ContentDiscoveryProvider>,
        trigger: Arc<dyn BackgroundTrigger>,
    ) -> Self {
        let ingestor = ContentIngestor::new(Arc::clone(&store));
        Self {
            store,
            provider,
            trigger,
            ingestor,
            channel_guard: Arc::new(ChannelGuard::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn ContentDiscoveryProvider> {
        &self.provider
    }

    pub fn ingestor(&self) -> &ContentIngestor {
        &self.ingestor
    }

    /// Resolve the records to serve for `partition`.
    ///
    /// # Errors
    /// Only store failures. Provider and parse failures on the synchronous
    /// path degrade to whatever the store held before the attempt.
    pub async fn resolve(&self, partition: &str, force_refresh: bool) -> PoppinResult<Resolution> {
        let existing = self.read(partition).await?;
        let freshness = classify(&existing);

        let (mut events, path) = if existing.is_empty() || force_refresh {
            let ingested = match self.fetch_and_ingest(partition).await {
                Ok(count) => count,
                Err(e) if e.is_degradable() => {
                    warn!(city = %partition, error = %e, "Synchronous refresh yielded no events");
                    0
                }
                Err(e) => return Err(e),
            };
            let events = self.read(partition).await?;
            (events, RefreshPath::Synchronous { ingested })
        } else if freshness.is_stale() {
            info!(city = %partition, freshness = ?freshness, "Serving stale events");
            self.schedule_refresh(partition);
            (existing, RefreshPath::ServedStale)
        } else {
            debug!(city = %partition, count = existing.len(), "Serving fresh events");
            (existing, RefreshPath::ServedFresh)
        };

        sort_by_start_time(&mut events);
        Ok(Resolution {
            events,
            path,
            freshness,
        })
    }

    /// Query the provider for `partition` and merge-ingest the answer.
    pub async fn fetch_and_ingest(&self, partition: &str) -> PoppinResult<usize> {
        let raw = self.provider.query(partition).await?;
        self.ingestor.ingest(partition, &raw).await
    }

    /// Submit a background refresh for `partition` and return at once.
    ///
    /// The channel-creation attempt (first call per process) and the publish
    /// run in a detached task; their failures are logged and never reach the
    /// caller. Returns `false` only when no runtime is available to run the
    /// task.
    pub fn schedule_refresh(&self, partition: &str) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!(city = %partition, "No runtime available; background refresh not scheduled");
            return false;
        };

        let trigger = Arc::clone(&self.trigger);
        let guard = Arc::clone(&self.channel_guard);
        let partition = partition.to_string();

        handle.spawn(async move {
            guard.ensure(trigger.as_ref()).await;
            match trigger.publish(&partition).await {
                Ok(()) => debug!(
                    city = %partition,
                    channel = trigger.channel_name(),
                    "Published background refresh"
                ),
                Err(e) => warn!(
                    city = %partition,
                    channel = trigger.channel_name(),
                    error = %e,
                    "Failed to publish background refresh"
                ),
            }
        });
        true
    }

    async fn read(&self, partition: &str) -> PoppinResult<Vec<EventRecord>> {
        Ok(self
            .store
            .query(partition)
            .await?
            .into_iter()
            .map(|doc| doc.record)
            .collect())
    }
}

impl std::fmt::Debug for RefreshDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshDispatcher")
            .field("provider", &self.provider.name())
            .field("channel", &self.trigger.channel_name())
            .field("channel_checked", &self.channel_guard.is_checked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::trigger::ChannelStatus;
    use crate::{InMemoryDocumentStore, WriteBatch};
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use poppin_core::{
        format_timestamp, PoppinError, ProviderError, RecordIdentity, StoreError, FIELD_CITY,
        FIELD_FETCHED_AT, FIELD_START_TIME, FIELD_TITLE,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct FixedProvider {
        answer: Result<String, ProviderError>,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(answer: Result<String, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ContentDiscoveryProvider for FixedProvider {
        async fn query(&self, _place: &str) -> PoppinResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().map_err(PoppinError::from)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct NotifyingTrigger {
        published: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl BackgroundTrigger for NotifyingTrigger {
        async fn ensure_channel(&self) -> PoppinResult<ChannelStatus> {
            Ok(ChannelStatus::Created)
        }

        async fn publish(&self, partition: &str) -> PoppinResult<()> {
            let _ = self.published.send(partition.to_string());
            Ok(())
        }

        fn channel_name(&self) -> &str {
            "test"
        }
    }

    struct Harness {
        store: Arc<InMemoryDocumentStore>,
        provider: Arc<FixedProvider>,
        published: mpsc::UnboundedReceiver<String>,
        dispatcher: RefreshDispatcher,
    }

    fn harness(answer: Result<String, ProviderError>) -> Harness {
        let store = Arc::new(InMemoryDocumentStore::new());
        let provider = FixedProvider::new(answer);
        let (tx, published) = mpsc::unbounded_channel();
        let dispatcher = RefreshDispatcher::new(
            store.clone(),
            provider.clone(),
            Arc::new(NotifyingTrigger { published: tx }),
        );
        Harness {
            store,
            provider,
            published,
            dispatcher,
        }
    }

    async fn seed(store: &InMemoryDocumentStore, title: &str, start: &str, age: TimeDelta) {
        let record = EventRecord::new()
            .with_field(FIELD_TITLE, title)
            .with_field(FIELD_START_TIME, start)
            .with_field(FIELD_CITY, "Testville")
            .with_field(FIELD_FETCHED_AT, format_timestamp(Utc::now() - age));
        let mut batch = WriteBatch::new();
        batch.upsert(RecordIdentity::from_raw(format!("Testville_{title}")), record);
        store.batch_write(batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_partition_fetches_synchronously() {
        let h = harness(Ok(r#"[{"title":"Gig","address":"Hall","startTime":"2025-01-02"}]"#.to_string()));

        let resolution = h.dispatcher.resolve("Testville", false).await.unwrap();

        assert_eq!(resolution.path, RefreshPath::Synchronous { ingested: 1 });
        assert_eq!(resolution.freshness, Freshness::Absent);
        assert_eq!(resolution.events.len(), 1);
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_partition_served_without_provider_or_trigger() {
        let mut h = harness(Ok("[]".to_string()));
        seed(&h.store, "Gig", "2025-01-02", TimeDelta::hours(2)).await;

        let resolution = h.dispatcher.resolve("Testville", false).await.unwrap();

        assert_eq!(resolution.path, RefreshPath::ServedFresh);
        assert_eq!(resolution.events.len(), 1);
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.published.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_partition_served_and_published_once() {
        let mut h = harness(Ok("[]".to_string()));
        seed(&h.store, "Gig", "2025-01-02", TimeDelta::hours(30)).await;

        let resolution = h.dispatcher.resolve("Testville", false).await.unwrap();

        assert_eq!(resolution.path, RefreshPath::ServedStale);
        assert_eq!(resolution.events[0].title(), Some("Gig"));
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);

        let published = tokio::time::timeout(Duration::from_secs(2), h.published.recv())
            .await
            .unwrap();
        assert_eq!(published.as_deref(), Some("Testville"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.published.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_force_refresh_fetches_even_when_fresh() {
        let h = harness(Ok(r#"[{"title":"New","address":"Hall"}]"#.to_string()));
        seed(&h.store, "Gig", "2025-01-02", TimeDelta::hours(1)).await;

        let resolution = h.dispatcher.resolve("Testville", true).await.unwrap();

        assert_eq!(resolution.path, RefreshPath::Synchronous { ingested: 1 });
        assert_eq!(resolution.events.len(), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_stored_records() {
        let h = harness(Err(ProviderError::RequestFailed {
            provider: "fixed".to_string(),
            status: 503,
            message: "unavailable".to_string(),
        }));
        seed(&h.store, "Gig", "2025-01-02", TimeDelta::hours(1)).await;

        let resolution = h.dispatcher.resolve("Testville", true).await.unwrap();

        assert_eq!(resolution.path, RefreshPath::Synchronous { ingested: 0 });
        assert_eq!(resolution.events.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_answer_on_empty_partition_returns_empty() {
        let h = harness(Ok("no events found".to_string()));

        let resolution = h.dispatcher.resolve("Testville", false).await.unwrap();

        assert_eq!(resolution.path, RefreshPath::Synchronous { ingested: 0 });
        assert!(resolution.events.is_empty());
    }

    #[tokio::test]
    async fn test_events_sorted_by_start_time() {
        let h = harness(Ok("[]".to_string()));
        seed(&h.store, "Late", "2025-03-01", TimeDelta::hours(1)).await;
        seed(&h.store, "Early", "2025-01-01", TimeDelta::hours(1)).await;

        let resolution = h.dispatcher.resolve("Testville", false).await.unwrap();

        let titles: Vec<_> = resolution.events.iter().filter_map(|e| e.title()).collect();
        assert_eq!(titles, vec!["Early", "Late"]);
    }

    #[test]
    fn test_schedule_refresh_without_runtime() {
        let h = harness(Ok("[]".to_string()));
        assert!(!h.dispatcher.schedule_refresh("Testville"));
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        struct BrokenStore;

        #[async_trait]
        impl DocumentStore for BrokenStore {
            async fn query(&self, partition: &str) -> PoppinResult<Vec<crate::StoredDocument>> {
                Err(StoreError::ReadFailed {
                    partition: partition.to_string(),
                    reason: "offline".to_string(),
                }
                .into())
            }
            async fn batch_write(&self, _batch: WriteBatch) -> PoppinResult<()> {
                Err(StoreError::LockPoisoned.into())
            }
            async fn upsert_city(&self, _name: &str, _status: crate::CityStatus) -> PoppinResult<()> {
                Ok(())
            }
            async fn active_cities(&self) -> PoppinResult<Vec<String>> {
                Ok(Vec::new())
            }
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        let dispatcher = RefreshDispatcher::new(
            Arc::new(BrokenStore),
            FixedProvider::new(Ok("[]".to_string())),
            Arc::new(NotifyingTrigger { published: tx }),
        );

        let err = dispatcher.resolve("Testville", false).await.unwrap_err();
        assert!(matches!(err, PoppinError::Store(_)));
    }
}
