//! Event record representation.
//!
//! Providers do not agree on a schema, so a record is kept as the raw JSON
//! object it arrived as. Typed accessors cover the semantic fields the cache
//! engine relies on; every other field rides along untouched.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Timestamp;

/// A stored document: an arbitrary JSON object.
pub type Document = Map<String, Value>;

// ============================================================================
// FIELD NAMES
// ============================================================================

pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_START_TIME: &str = "startTime";
pub const FIELD_ADDRESS: &str = "address";
pub const FIELD_CITY: &str = "city";
pub const FIELD_FETCHED_AT: &str = "fetchedAt";

/// Sort key used for records without a `startTime`.
pub const MISSING_START_TIME_SORT_KEY: &str = "0";

// ============================================================================
// EVENT RECORD
// ============================================================================

/// A single event-like record, as fetched from a provider or read from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRecord {
    fields: Document,
}

impl EventRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing document.
    pub fn from_document(fields: Document) -> Self {
        Self { fields }
    }

    /// Set a field, returning the record for chaining.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn document(&self) -> &Document {
        &self.fields
    }

    pub fn into_document(self) -> Document {
        self.fields
    }

    /// Raw value of any field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value of a field, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str(FIELD_TITLE)
    }

    pub fn description(&self) -> Option<&str> {
        self.get_str(FIELD_DESCRIPTION)
    }

    pub fn category(&self) -> Option<&str> {
        self.get_str(FIELD_CATEGORY)
    }

    pub fn start_time(&self) -> Option<&str> {
        self.get_str(FIELD_START_TIME)
    }

    pub fn address(&self) -> Option<&str> {
        self.get_str(FIELD_ADDRESS)
    }

    pub fn city(&self) -> Option<&str> {
        self.get_str(FIELD_CITY)
    }

    /// Raw provenance value. May be missing or of any JSON type.
    pub fn fetched_at_raw(&self) -> Option<&Value> {
        self.fields.get(FIELD_FETCHED_AT).filter(|v| !v.is_null())
    }

    /// Parsed provenance timestamp, if present and parseable.
    pub fn fetched_at(&self) -> Option<Timestamp> {
        self.fetched_at_raw().and_then(parse_timestamp)
    }

    /// Overwrite the partition and provenance fields.
    ///
    /// Provider-supplied values for `city` and `fetchedAt` never survive ingest.
    pub fn stamp(&mut self, city: &str, fetched_at: Timestamp) {
        self.fields
            .insert(FIELD_CITY.to_string(), Value::String(city.to_string()));
        self.fields.insert(
            FIELD_FETCHED_AT.to_string(),
            Value::String(format_timestamp(fetched_at)),
        );
    }

    /// Merge `newer` into this record: new fields win, absent ones are kept.
    pub fn merge_from(&mut self, newer: &EventRecord) {
        for (key, value) in &newer.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Presentation sort key derived from `startTime`.
    ///
    /// Strings sort as-is, other JSON values by their JSON rendering, and a
    /// missing value as `"0"` so it sorts first.
    pub fn sort_key(&self) -> Cow<'_, str> {
        match self.fields.get(FIELD_START_TIME) {
            Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
            None | Some(Value::Null) => Cow::Borrowed(MISSING_START_TIME_SORT_KEY),
            Some(other) => Cow::Owned(other.to_string()),
        }
    }
}

impl From<Document> for EventRecord {
    fn from(fields: Document) -> Self {
        Self::from_document(fields)
    }
}

/// Sort records by their `startTime` sort key (lexicographic, stable).
pub fn sort_by_start_time(records: &mut [EventRecord]) {
    records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

/// Render a timestamp the way it is persisted (RFC 3339, UTC, microseconds).
pub fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a provenance value into a UTC timestamp.
///
/// Timestamps without an explicit offset are taken as UTC, never local time.
/// Anything that is not a string, or a string in none of the accepted
/// layouts, yields `None`.
pub fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    let raw = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_accessors_read_string_fields() {
        let record = EventRecord::new()
            .with_field(FIELD_TITLE, "Gig")
            .with_field(FIELD_ADDRESS, "Hall")
            .with_field(FIELD_START_TIME, "2025-01-02");

        assert_eq!(record.title(), Some("Gig"));
        assert_eq!(record.address(), Some("Hall"));
        assert_eq!(record.start_time(), Some("2025-01-02"));
        assert_eq!(record.city(), None);
    }

    #[test]
    fn test_stamp_overwrites_provider_values() {
        let mut record = EventRecord::new()
            .with_field(FIELD_CITY, "Elsewhere")
            .with_field(FIELD_FETCHED_AT, "1999-01-01T00:00:00Z");
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        record.stamp("Testville", now);

        assert_eq!(record.city(), Some("Testville"));
        assert_eq!(record.fetched_at(), Some(now));
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut old = EventRecord::new()
            .with_field(FIELD_TITLE, "Gig")
            .with_field("ticketUrl", "https://example.org")
            .with_field(FIELD_DESCRIPTION, "old");
        let newer = EventRecord::new()
            .with_field(FIELD_TITLE, "Gig")
            .with_field(FIELD_DESCRIPTION, "new");

        old.merge_from(&newer);

        assert_eq!(old.description(), Some("new"));
        assert_eq!(old.get_str("ticketUrl"), Some("https://example.org"));
    }

    #[test]
    fn test_sort_key_missing_sorts_first() {
        let mut records = vec![
            EventRecord::new().with_field(FIELD_START_TIME, "2025-12-30T20:00"),
            EventRecord::new().with_field(FIELD_TITLE, "No time"),
            EventRecord::new().with_field(FIELD_START_TIME, "2025-12-29T18:00"),
        ];

        sort_by_start_time(&mut records);

        assert_eq!(records[0].title(), Some("No time"));
        assert_eq!(records[1].start_time(), Some("2025-12-29T18:00"));
        assert_eq!(records[2].start_time(), Some("2025-12-30T20:00"));
    }

    #[test]
    fn test_sort_key_non_string_uses_json_rendering() {
        let record = EventRecord::new().with_field(FIELD_START_TIME, 20250101);
        assert_eq!(record.sort_key(), "20250101");
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let parsed = parse_timestamp(&json!("2025-01-02T10:00:00+02:00")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        let parsed = parse_timestamp(&json!("2025-01-02T10:00:00.123456")).unwrap();
        assert_eq!(
            parsed.timestamp(),
            Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_parse_timestamp_space_separated_with_offset() {
        let parsed = parse_timestamp(&json!("2025-01-02 10:00:00+00:00")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_date_only() {
        let parsed = parse_timestamp(&json!("2025-01-02")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage_and_non_strings() {
        assert!(parse_timestamp(&json!("yesterday-ish")).is_none());
        assert!(parse_timestamp(&json!(1735812000)).is_none());
        assert!(parse_timestamp(&json!({"seconds": 1})).is_none());
    }

    #[test]
    fn test_format_round_trips_through_parse() {
        let now = Utc::now();
        let parsed = parse_timestamp(&json!(format_timestamp(now))).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
