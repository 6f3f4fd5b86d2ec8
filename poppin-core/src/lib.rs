//! Poppin Core - Event Records and Collaborator Contracts
//!
//! Pure data structures and pure functions. All other crates depend on this.
//! Nothing here performs I/O.

pub mod error;
pub mod event;
pub mod identity;
pub mod normalize;
pub mod provider;

use chrono::{DateTime, Utc};
use std::time::Duration;

pub use error::{
    ConfigError, GeoError, ParseError, PoppinError, PoppinResult, ProviderError, StoreError,
    TriggerError,
};
pub use event::{
    format_timestamp, parse_timestamp, sort_by_start_time, Document, EventRecord,
    FIELD_ADDRESS, FIELD_CATEGORY, FIELD_CITY, FIELD_DESCRIPTION, FIELD_FETCHED_AT,
    FIELD_START_TIME, FIELD_TITLE,
};
pub use identity::{RecordIdentity, UNKNOWN_FIELD};
pub use normalize::{extract_json_block, normalize, NormalizedBatch};
pub use provider::{ContentDiscoveryProvider, GeoResolver};

// ============================================================================
// SHARED TYPES AND CONSTANTS
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Maximum age of a partition's record set before it is considered stale.
pub const FRESHNESS_WINDOW_SECS: i64 = 24 * 60 * 60;

/// [`FRESHNESS_WINDOW_SECS`] as a `Duration`.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(FRESHNESS_WINDOW_SECS as u64);

/// Place used when neither a city nor resolvable coordinates are given.
pub const DEFAULT_CITY: &str = "Braunschweig";
