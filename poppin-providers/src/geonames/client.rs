//! GeoNames HTTP client

use std::time::Duration;

use async_trait::async_trait;
use poppin_core::{GeoError, GeoResolver, PoppinResult};
use reqwest::Client;
use tracing::debug;

use super::types::NearbyResponse;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "http://api.geonames.org";

const MAX_ROWS: u32 = 5;
const CITY_FILTER: &str = "cities15000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`GeoResolver`] backed by GeoNames `findNearbyPlaceNameJSON`.
#[derive(Debug, Clone)]
pub struct GeoNamesResolver {
    client: Client,
    username: String,
    base_url: String,
}

impl GeoNamesResolver {
    pub fn new(username: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            username: username.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the resolver at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn endpoint(&self) -> String {
        format!("{}/findNearbyPlaceNameJSON", self.base_url)
    }
}

/// Place names from a decoded response, closest first.
pub(crate) fn place_names(response: NearbyResponse) -> Result<Vec<String>, GeoError> {
    if let Some(status) = response.status {
        return Err(GeoError::InvalidResponse {
            reason: status.message,
        });
    }
    Ok(response.geonames.into_iter().map(|g| g.name).collect())
}

#[async_trait]
impl GeoResolver for GeoNamesResolver {
    async fn nearby(&self, lat: f64, lng: f64, radius_km: u32) -> PoppinResult<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("lat", lat.to_string()),
                ("lng", lng.to_string()),
                ("radius", radius_km.to_string()),
                ("maxRows", MAX_ROWS.to_string()),
                ("cities", CITY_FILTER.to_string()),
                ("username", self.username.clone()),
            ])
            .send()
            .await
            .map_err(|e| GeoError::RequestFailed {
                reason: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| GeoError::RequestFailed {
                reason: e.to_string(),
            })?;

        let body: NearbyResponse = response.json().await.map_err(|e| GeoError::InvalidResponse {
            reason: e.to_string(),
        })?;

        let names = place_names(body)?;
        debug!(lat, lng, radius_km, found = names.len(), "Resolved nearby places");
        Ok(names)
    }
}
