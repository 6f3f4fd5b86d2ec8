//! Service configuration loaded from the environment.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use poppin_core::{ConfigError, DEFAULT_CITY};
use poppin_providers::gemini::DEFAULT_MODEL;

use crate::constants::*;
use crate::jobs::PeriodicSweepConfig;

/// Which [`poppin_storage::DocumentStore`] backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Lmdb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lmdb" => Ok(Self::Lmdb),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                field: ENV_STORE.to_string(),
                value: other.to_string(),
                reason: "expected 'lmdb' or 'memory'".to_string(),
            }),
        }
    }
}

/// Everything the binary needs to wire the service together.
#[derive(Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_rpm: u32,
    pub geonames_user: String,
    pub geo_radius_km: u32,
    /// Partition served when no city can be resolved from the request.
    pub default_city: String,
    pub store: StoreBackend,
    pub data_dir: PathBuf,
    pub store_max_mb: usize,
    pub trigger_topic: String,
    pub sweep: PeriodicSweepConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_API_PORT)),
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_rpm: DEFAULT_GEMINI_RPM,
            geonames_user: DEFAULT_GEONAMES_USER.to_string(),
            geo_radius_km: DEFAULT_GEO_RADIUS_KM,
            default_city: DEFAULT_CITY.to_string(),
            store: StoreBackend::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            store_max_mb: DEFAULT_STORE_MAX_MB,
            trigger_topic: DEFAULT_TRIGGER_TOPIC.to_string(),
            sweep: PeriodicSweepConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from process environment variables.
    ///
    /// # Environment Variables
    /// - `POPPIN_API_BIND` / `PORT` / `POPPIN_API_PORT`: listen address (default: 0.0.0.0:8080)
    /// - `GEMINI_API_KEY`: content discovery key (optional)
    /// - `POPPIN_GEMINI_MODEL`, `POPPIN_GEMINI_RPM`: model and request budget
    /// - `GEONAMES_USER`, `POPPIN_GEO_RADIUS_KM`: nearby-place resolution
    /// - `POPPIN_DEFAULT_CITY`: fallback partition (default: Braunschweig)
    /// - `POPPIN_STORE`, `POPPIN_DATA_DIR`, `POPPIN_STORE_MAX_MB`: document store
    /// - `POPPIN_TRIGGER_TOPIC`: background refresh channel name
    /// - `POPPIN_SWEEP_INTERVAL_SECS`, `POPPIN_SWEEP_ENABLED`: periodic sweep
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = var(ENV_API_BIND).unwrap_or_else(|| DEFAULT_API_BIND.to_string());
        let port = match var(ENV_PORT).or_else(|| var(ENV_API_PORT)) {
            Some(raw) => parse_value::<u16>(ENV_API_PORT, &raw)?,
            None => DEFAULT_API_PORT,
        };
        let addr = format!("{}:{}", host, port);
        let bind_addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: ENV_API_BIND.to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })?;

        let sweep = PeriodicSweepConfig {
            interval: std::time::Duration::from_secs(parse_or(
                &var,
                ENV_SWEEP_INTERVAL_SECS,
                DEFAULT_SWEEP_INTERVAL_SECS,
            )?),
            enabled: var(ENV_SWEEP_ENABLED)
                .map(|s| s.to_lowercase() != "false" && s != "0")
                .unwrap_or(true),
        };
        if sweep.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: ENV_SWEEP_INTERVAL_SECS.to_string(),
                value: "0".to_string(),
                reason: "interval must be positive".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            gemini_api_key: var(ENV_GEMINI_API_KEY),
            gemini_model: var(ENV_GEMINI_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_rpm: parse_or(&var, ENV_GEMINI_RPM, DEFAULT_GEMINI_RPM)?,
            geonames_user: var(ENV_GEONAMES_USER)
                .unwrap_or_else(|| DEFAULT_GEONAMES_USER.to_string()),
            geo_radius_km: parse_or(&var, ENV_GEO_RADIUS_KM, DEFAULT_GEO_RADIUS_KM)?,
            default_city: var(ENV_DEFAULT_CITY).unwrap_or_else(|| DEFAULT_CITY.to_string()),
            store: var(ENV_STORE)
                .map(|s| s.parse::<StoreBackend>())
                .transpose()?
                .unwrap_or_default(),
            data_dir: var(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            store_max_mb: parse_or(&var, ENV_STORE_MAX_MB, DEFAULT_STORE_MAX_MB)?,
            trigger_topic: var(ENV_TRIGGER_TOPIC)
                .unwrap_or_else(|| DEFAULT_TRIGGER_TOPIC.to_string()),
            sweep,
        })
    }
}

fn parse_value<T>(field: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T, F>(var: &F, field: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(field) {
        Some(raw) => parse_value(field, &raw),
        None => Ok(default),
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("gemini_model", &self.gemini_model)
            .field("gemini_rpm", &self.gemini_rpm)
            .field("geonames_user", &self.geonames_user)
            .field("geo_radius_km", &self.geo_radius_km)
            .field("default_city", &self.default_city)
            .field("store", &self.store)
            .field("data_dir", &self.data_dir)
            .field("store_max_mb", &self.store_max_mb)
            .field("trigger_topic", &self.trigger_topic)
            .field("sweep", &self.sweep)
            .finish()
    }
}
