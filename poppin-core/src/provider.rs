//! Contracts for the external collaborators the cache engine talks to.
//!
//! Concrete HTTP implementations live in poppin-providers; test doubles live
//! in poppin-test-utils.

use async_trait::async_trait;

use crate::PoppinResult;

/// Source of event listings for a place.
///
/// Returns the provider's raw text answer. The text is untrusted and may or
/// may not contain a JSON array; see [`crate::normalize`].
#[async_trait]
pub trait ContentDiscoveryProvider: Send + Sync {
    /// Ask the provider for upcoming events in `place`.
    ///
    /// # Errors
    /// `PoppinError::Provider` when the provider cannot produce an answer.
    async fn query(&self, place: &str) -> PoppinResult<String>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Reverse geocoder from coordinates to nearby place names.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Place names near (`lat`, `lng`), closest first.
    ///
    /// # Errors
    /// `PoppinError::Geo` when the lookup fails.
    async fn nearby(&self, lat: f64, lng: f64, radius_km: u32) -> PoppinResult<Vec<String>>;
}
