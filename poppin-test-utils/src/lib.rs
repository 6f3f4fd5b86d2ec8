//! Poppin Test Utilities
//!
//! Centralized test infrastructure for the Poppin workspace:
//! - Mock collaborators (provider, trigger, geo resolver, store)
//! - Test fixtures for common scenarios
//! - Proptest generators for event records
//! - Custom assertions

// Re-export core types for convenience
pub use poppin_core::{
    ContentDiscoveryProvider, EventRecord, GeoError, GeoResolver, PoppinError, PoppinResult,
    ProviderError, RecordIdentity, StoreError, Timestamp, TriggerError, FIELD_ADDRESS,
    FIELD_CITY, FIELD_FETCHED_AT, FIELD_START_TIME, FIELD_TITLE,
};
pub use poppin_storage::{
    BackgroundTrigger, ChannelStatus, CityStatus, DocumentStore, InMemoryDocumentStore,
    StoredDocument, WriteBatch,
};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MOCK PROVIDERS
// ============================================================================

/// Content provider that replays queued answers, then a fallback.
#[derive(Debug)]
pub struct ScriptedProvider {
    queued: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Result<String, ProviderError>,
    places: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Provider that always answers `text`.
    pub fn answering(text: impl Into<String>) -> Self {
        Self::with_fallback(Ok(text.into()))
    }

    /// Provider that always fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: Result<String, ProviderError>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback,
            places: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a one-shot answer served before the fallback.
    pub fn then(self, answer: Result<String, ProviderError>) -> Self {
        lock(&self.queued).push_back(answer);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Places queried so far, in call order.
    pub fn places(&self) -> Vec<String> {
        lock(&self.places).clone()
    }
}

#[async_trait]
impl ContentDiscoveryProvider for ScriptedProvider {
    async fn query(&self, place: &str) -> PoppinResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.places).push(place.to_string());
        let answer = lock(&self.queued)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        answer.map_err(PoppinError::from)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Error used by failing mocks.
pub fn unavailable() -> ProviderError {
    ProviderError::RequestFailed {
        provider: "scripted".to_string(),
        status: 503,
        message: "unavailable".to_string(),
    }
}

// ============================================================================
// MOCK TRIGGER
// ============================================================================

/// Background trigger that records publishes and optionally forwards them.
#[derive(Debug, Default)]
pub struct RecordingTrigger {
    ensure_calls: AtomicUsize,
    published: Mutex<Vec<String>>,
    notify: Option<mpsc::UnboundedSender<String>>,
    fail_publish: bool,
}

impl RecordingTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger plus a receiver that sees every published partition.
    pub fn notifying() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let trigger = Self {
            notify: Some(tx),
            ..Self::default()
        };
        (trigger, rx)
    }

    /// Trigger whose publishes all fail.
    pub fn rejecting() -> Self {
        Self {
            fail_publish: true,
            ..Self::default()
        }
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<String> {
        lock(&self.published).clone()
    }
}

#[async_trait]
impl BackgroundTrigger for RecordingTrigger {
    async fn ensure_channel(&self) -> PoppinResult<ChannelStatus> {
        if self.ensure_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(ChannelStatus::Created)
        } else {
            Ok(ChannelStatus::AlreadyExists)
        }
    }

    async fn publish(&self, partition: &str) -> PoppinResult<()> {
        if self.fail_publish {
            return Err(TriggerError::PublishFailed {
                channel: self.channel_name().to_string(),
                reason: "rejected".to_string(),
            }
            .into());
        }
        lock(&self.published).push(partition.to_string());
        if let Some(notify) = &self.notify {
            let _ = notify.send(partition.to_string());
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

// ============================================================================
// MOCK GEO RESOLVER
// ============================================================================

/// Geo resolver returning a fixed list of places, or failing.
#[derive(Debug, Clone, Default)]
pub struct StaticGeoResolver {
    places: Vec<String>,
    fail: bool,
}

impl StaticGeoResolver {
    pub fn new<I, S>(places: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            places: places.into_iter().map(Into::into).collect(),
            fail: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            places: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl GeoResolver for StaticGeoResolver {
    async fn nearby(&self, _lat: f64, _lng: f64, _radius_km: u32) -> PoppinResult<Vec<String>> {
        if self.fail {
            return Err(GeoError::RequestFailed {
                reason: "geo service offline".to_string(),
            }
            .into());
        }
        Ok(self.places.clone())
    }
}

// ============================================================================
// MOCK STORE
// ============================================================================

/// Document store whose every operation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn query(&self, partition: &str) -> PoppinResult<Vec<StoredDocument>> {
        Err(StoreError::ReadFailed {
            partition: partition.to_string(),
            reason: "store offline".to_string(),
        }
        .into())
    }

    async fn batch_write(&self, batch: WriteBatch) -> PoppinResult<()> {
        Err(StoreError::BatchFailed {
            operations: batch.len(),
            reason: "store offline".to_string(),
        }
        .into())
    }

    async fn upsert_city(&self, _name: &str, _status: CityStatus) -> PoppinResult<()> {
        Err(StoreError::WriteFailed {
            reason: "store offline".to_string(),
        }
        .into())
    }

    async fn active_cities(&self) -> PoppinResult<Vec<String>> {
        Err(StoreError::ReadFailed {
            partition: "cities".to_string(),
            reason: "store offline".to_string(),
        }
        .into())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and provider answers.

    use super::*;
    use chrono::{TimeDelta, Utc};

    pub const TESTVILLE: &str = "Testville";

    /// A provider-shaped record: no city, no provenance.
    pub fn event(title: &str, address: &str, start_time: &str) -> EventRecord {
        EventRecord::new()
            .with_field(FIELD_TITLE, title)
            .with_field(FIELD_ADDRESS, address)
            .with_field(FIELD_START_TIME, start_time)
    }

    /// A stored record in `city`, fetched `age` ago.
    pub fn stored_event(city: &str, title: &str, address: &str, age: TimeDelta) -> EventRecord {
        let mut record = event(title, address, "2025-01-02T20:00");
        record.stamp(city, Utc::now() - age);
        record
    }

    /// Raw provider answer wrapping `records` the way a chat model does.
    pub fn provider_answer(records: &[EventRecord]) -> String {
        let array = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
        format!("Here are the events I found:\n```json\n{array}\n```\nHave fun!")
    }

    /// The canonical single-record answer.
    pub fn gig_answer() -> String {
        r#"[{"title":"Gig","address":"Hall","startTime":"2025-01-02"}]"#.to_string()
    }

    /// Write `records` into `store` under their derived identities.
    pub async fn seed(store: &dyn DocumentStore, city: &str, records: Vec<EventRecord>) {
        let mut batch = WriteBatch::new();
        for record in records {
            batch.upsert(RecordIdentity::derive(city, &record), record);
        }
        if let Err(e) = store.batch_write(batch).await {
            panic!("seeding {city} failed: {e}");
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for event records.

    use super::*;
    use proptest::prelude::*;

    /// Place names without separators.
    pub fn arb_place() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,12}"
    }

    /// `YYYY-MM-DDTHH:MM` start times.
    pub fn arb_start_time() -> impl Strategy<Value = String> {
        (2024u32..2027, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60)
            .prop_map(|(y, mo, d, h, mi)| format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}"))
    }

    /// Provider-shaped record with an optional start time.
    pub fn arb_event_record() -> impl Strategy<Value = EventRecord> {
        (
            "[A-Za-z ]{1,20}",
            "[A-Za-z0-9 ]{1,20}",
            proptest::option::of(arb_start_time()),
        )
            .prop_map(|(title, address, start)| {
                let record = EventRecord::new()
                    .with_field(FIELD_TITLE, title)
                    .with_field(FIELD_ADDRESS, address);
                match start {
                    Some(start) => record.with_field(FIELD_START_TIME, start),
                    None => record,
                }
            })
    }

    pub fn arb_event_records(max: usize) -> impl Strategy<Value = Vec<EventRecord>> {
        proptest::collection::vec(arb_event_record(), 0..=max)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Poppin-specific invariants.

    use super::*;

    /// Assert that records are in non-decreasing `startTime` order.
    #[track_caller]
    pub fn assert_sorted_by_start_time(records: &[EventRecord]) {
        for pair in records.windows(2) {
            assert!(
                pair[0].sort_key() <= pair[1].sort_key(),
                "records out of order: {:?} before {:?}",
                pair[0].sort_key(),
                pair[1].sort_key()
            );
        }
    }

    /// Assert that a result is a store error.
    #[track_caller]
    pub fn assert_store_error<T: std::fmt::Debug>(result: &PoppinResult<T>) {
        match result {
            Err(PoppinError::Store(_)) => {}
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
