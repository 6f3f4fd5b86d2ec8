//! Centralized constants for the Poppin API.
//!
//! Every environment variable the service reads, and the default applied when
//! it is unset, lives here.

// ============================================================================
// SERVER
// ============================================================================

/// Bind host override.
pub const ENV_API_BIND: &str = "POPPIN_API_BIND";

/// Port override (the platform-provided `PORT` wins when both are set).
pub const ENV_PORT: &str = "PORT";
pub const ENV_API_PORT: &str = "POPPIN_API_PORT";

pub const DEFAULT_API_BIND: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 8080;

// ============================================================================
// CONTENT DISCOVERY
// ============================================================================

pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "POPPIN_GEMINI_MODEL";
pub const ENV_GEMINI_RPM: &str = "POPPIN_GEMINI_RPM";

/// Client-side request budget per minute.
pub const DEFAULT_GEMINI_RPM: u32 = 30;

// ============================================================================
// GEO RESOLUTION
// ============================================================================

pub const ENV_GEONAMES_USER: &str = "GEONAMES_USER";
pub const ENV_GEO_RADIUS_KM: &str = "POPPIN_GEO_RADIUS_KM";
pub const ENV_DEFAULT_CITY: &str = "POPPIN_DEFAULT_CITY";

pub const DEFAULT_GEONAMES_USER: &str = "poppin";

/// Search radius for nearby-place resolution, in kilometers.
pub const DEFAULT_GEO_RADIUS_KM: u32 = 30;

// ============================================================================
// STORE
// ============================================================================

pub const ENV_STORE: &str = "POPPIN_STORE";
pub const ENV_DATA_DIR: &str = "POPPIN_DATA_DIR";
pub const ENV_STORE_MAX_MB: &str = "POPPIN_STORE_MAX_MB";

pub const DEFAULT_DATA_DIR: &str = "./data/poppin";

/// LMDB map size in megabytes.
pub const DEFAULT_STORE_MAX_MB: usize = 256;

// ============================================================================
// BACKGROUND REFRESH
// ============================================================================

pub const ENV_SWEEP_INTERVAL_SECS: &str = "POPPIN_SWEEP_INTERVAL_SECS";
pub const ENV_SWEEP_ENABLED: &str = "POPPIN_SWEEP_ENABLED";
pub const ENV_TRIGGER_TOPIC: &str = "POPPIN_TRIGGER_TOPIC";

/// Six hours between periodic sweeps of the active cities.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 6 * 60 * 60;

pub const DEFAULT_TRIGGER_TOPIC: &str = "fetch-events";

// ============================================================================
// HTTP SURFACE
// ============================================================================

/// Characters of raw provider output echoed back by `POST /trigger-fetch`.
pub const RAW_RESPONSE_PREVIEW_CHARS: usize = 500;

// ============================================================================
// LOGGING
// ============================================================================

pub const ENV_LOG_FORMAT: &str = "POPPIN_LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "poppin_api=info,poppin_storage=info,tower_http=info,info";
