//! Error types for Poppin operations

use thiserror::Error;

/// Content-discovery provider errors.
///
/// Recovered locally by the refresh engine: a failed provider call degrades
/// to zero ingested records, never to a failed lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider {provider} is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },
}

/// Errors extracting a record list from provider text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Provider text is not valid JSON ({reason}): {preview}")]
    InvalidJson { reason: String, preview: String },

    #[error("Expected a JSON array of events, found {found}")]
    NotAnArray { found: String },
}

/// Document store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Read failed for partition {partition}: {reason}")]
    ReadFailed { partition: String, reason: String },

    #[error("Write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("Batch of {operations} operations failed: {reason}")]
    BatchFailed { operations: usize, reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    #[error("Failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Background trigger errors. Always swallowed by the dispatcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Failed to create channel {channel}: {reason}")]
    ChannelCreation { channel: String, reason: String },

    #[error("Failed to publish to {channel}: {reason}")]
    PublishFailed { channel: String, reason: String },

    #[error("Channel {channel} is closed")]
    ChannelClosed { channel: String },

    #[error("Failed to encode trigger message: {reason}")]
    Encode { reason: String },
}

/// Geo resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeoError {
    #[error("Geo lookup failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Invalid geo response: {reason}")]
    InvalidResponse { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Poppin errors.
#[derive(Debug, Clone, Error)]
pub enum PoppinError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    #[error("Geo error: {0}")]
    Geo(#[from] GeoError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl PoppinError {
    /// Whether a lookup may degrade past this error to whatever is stored.
    ///
    /// Provider, parse, geo and trigger failures are recovered locally.
    /// Store and config failures propagate to the caller.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::Parse(_) | Self::Geo(_) | Self::Trigger(_)
        )
    }
}

/// Result type alias for Poppin operations.
pub type PoppinResult<T> = Result<T, PoppinError>;

// =============================================================================
// TESTS
// =============================================================================
