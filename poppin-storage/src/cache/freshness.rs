//! Staleness classification for a partition's record set.
//!
//! The first record returned by the store stands in for the whole partition:
//! records of one partition are fetched together and share one provenance
//! timestamp. A partition with mixed provenance is classified by whichever
//! record the store lists first.

use chrono::{TimeDelta, Utc};
use poppin_core::{EventRecord, Timestamp, FRESHNESS_WINDOW_SECS};

/// Why a record set was judged stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The representative record has no `fetchedAt`.
    MissingProvenance,
    /// `fetchedAt` is present but in no accepted timestamp layout.
    UnparseableProvenance,
    /// The record set is older than the freshness window.
    Expired {
        /// Age of the representative record at classification time.
        age: TimeDelta,
    },
}

/// Verdict on a partition's cached records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No records are stored for the partition.
    Absent,
    /// Records are within the freshness window.
    Fresh,
    /// Records exist but must be refreshed.
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Fresh => "fresh",
            Self::Stale(_) => "stale",
        }
    }
}

/// Classify `records` against the current wall clock.
pub fn classify(records: &[EventRecord]) -> Freshness {
    classify_at(records, Utc::now())
}

/// Classify `records` as of `now`.
///
/// A delta of exactly the freshness window is still fresh; one second more
/// is stale. Provenance in the future counts as fresh.
pub fn classify_at(records: &[EventRecord], now: Timestamp) -> Freshness {
    let Some(representative) = records.first() else {
        return Freshness::Absent;
    };

    if representative.fetched_at_raw().is_none() {
        return Freshness::Stale(StaleReason::MissingProvenance);
    }
    let Some(fetched_at) = representative.fetched_at() else {
        return Freshness::Stale(StaleReason::UnparseableProvenance);
    };

    let age = now.signed_duration_since(fetched_at);
    if age > TimeDelta::seconds(FRESHNESS_WINDOW_SECS) {
        Freshness::Stale(StaleReason::Expired { age })
    } else {
        Freshness::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use poppin_core::{format_timestamp, FIELD_FETCHED_AT, FIELD_TITLE};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn fetched(at: Timestamp) -> EventRecord {
        EventRecord::new()
            .with_field(FIELD_TITLE, "Gig")
            .with_field(FIELD_FETCHED_AT, format_timestamp(at))
    }

    #[test]
    fn test_empty_is_absent() {
        assert_eq!(classify_at(&[], now()), Freshness::Absent);
    }

    #[test]
    fn test_missing_provenance_is_stale() {
        let records = vec![EventRecord::new().with_field(FIELD_TITLE, "Gig")];
        assert_eq!(
            classify_at(&records, now()),
            Freshness::Stale(StaleReason::MissingProvenance)
        );
    }

    #[test]
    fn test_null_provenance_is_missing() {
        let records = vec![EventRecord::new().with_field(FIELD_FETCHED_AT, serde_json::Value::Null)];
        assert_eq!(
            classify_at(&records, now()),
            Freshness::Stale(StaleReason::MissingProvenance)
        );
    }

    #[test]
    fn test_unparseable_provenance_is_stale() {
        let records = vec![EventRecord::new().with_field(FIELD_FETCHED_AT, "last tuesday")];
        assert_eq!(
            classify_at(&records, now()),
            Freshness::Stale(StaleReason::UnparseableProvenance)
        );
    }

    #[test]
    fn test_exact_window_is_fresh() {
        let records = vec![fetched(now() - TimeDelta::seconds(FRESHNESS_WINDOW_SECS))];
        assert_eq!(classify_at(&records, now()), Freshness::Fresh);
    }

    #[test]
    fn test_one_second_past_window_is_stale() {
        let age = TimeDelta::seconds(FRESHNESS_WINDOW_SECS + 1);
        let records = vec![fetched(now() - age)];
        assert_eq!(
            classify_at(&records, now()),
            Freshness::Stale(StaleReason::Expired { age })
        );
    }

    #[test]
    fn test_naive_provenance_is_read_as_utc() {
        // 23h before `now` when read as UTC.
        let records = vec![EventRecord::new().with_field(FIELD_FETCHED_AT, "2025-05-31T13:00:00")];
        assert!(classify_at(&records, now()).is_fresh());

        // 25h before `now` when read as UTC.
        let records = vec![EventRecord::new().with_field(FIELD_FETCHED_AT, "2025-05-31 11:00:00")];
        assert!(classify_at(&records, now()).is_stale());
    }

    #[test]
    fn test_first_record_is_representative() {
        let records = vec![
            fetched(now() - TimeDelta::hours(2)),
            fetched(now() - TimeDelta::hours(72)),
        ];
        assert!(classify_at(&records, now()).is_fresh());

        let records = vec![
            fetched(now() - TimeDelta::hours(72)),
            fetched(now() - TimeDelta::hours(2)),
        ];
        assert!(classify_at(&records, now()).is_stale());
    }

    #[test]
    fn test_future_provenance_is_fresh() {
        let records = vec![fetched(now() + TimeDelta::hours(1))];
        assert!(classify_at(&records, now()).is_fresh());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Freshness::Absent.label(), "absent");
        assert_eq!(Freshness::Fresh.label(), "fresh");
        assert_eq!(
            Freshness::Stale(StaleReason::MissingProvenance).label(),
            "stale"
        );
    }
}
