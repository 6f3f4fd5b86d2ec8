//! Shared application state for Axum routers.

use std::sync::Arc;

use poppin_core::GeoResolver;
use poppin_storage::{DocumentStore, RefreshDispatcher};

use crate::config::ServiceConfig;

/// How the lookup route turns a request into a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSettings {
    /// Served when neither a city nor usable coordinates are given.
    pub default_city: String,
    pub geo_radius_km: u32,
}

impl From<&ServiceConfig> for LookupSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            default_city: config.default_city.clone(),
            geo_radius_km: config.geo_radius_km,
        }
    }
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Refresh engine; also owns the store and provider handles.
    pub dispatcher: RefreshDispatcher,
    pub store: Arc<dyn DocumentStore>,
    pub geo: Arc<dyn GeoResolver>,
    pub lookup: Arc<LookupSettings>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        dispatcher: RefreshDispatcher,
        geo: Arc<dyn GeoResolver>,
        lookup: LookupSettings,
    ) -> Self {
        Self {
            store: Arc::clone(dispatcher.store()),
            dispatcher,
            geo,
            lookup: Arc::new(lookup),
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(RefreshDispatcher, dispatcher);
crate::impl_from_ref!(Arc<dyn DocumentStore>, store);
crate::impl_from_ref!(Arc<dyn GeoResolver>, geo);
crate::impl_from_ref!(Arc<LookupSettings>, lookup);
crate::impl_from_ref!(std::time::Instant, start_time);
