//! GeoNames `findNearbyPlaceNameJSON` response types

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NearbyResponse {
    #[serde(default)]
    pub geonames: Vec<GeoName>,
    /// Present instead of results when the service rejects the request
    /// (bad username, exhausted credits), still with HTTP 200.
    #[serde(default)]
    pub status: Option<ServiceStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoName {
    pub name: String,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub distance: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceStatus {
    pub message: String,
    #[serde(default)]
    pub value: Option<i64>,
}
