//! Event lookup endpoint
//!
//! `GET /events` resolves a partition from the request, then serves it
//! through the refresh dispatcher (stale-while-revalidate).

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use poppin_core::{EventRecord, GeoResolver};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, LookupSettings};

// ============================================================================
// TYPES
// ============================================================================

/// Query string accepted by `GET /events`.
///
/// Coordinates stay raw strings so a malformed value becomes a structured
/// 400 instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    pub city: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub force: Option<String>,
}

impl EventsQuery {
    /// `force=true` (exactly) requests a synchronous refresh.
    pub fn force_refresh(&self) -> bool {
        self.force.as_deref() == Some("true")
    }

    fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Parsed coordinates, if both are present.
    pub fn coordinates(&self) -> ApiResult<Option<(f64, f64)>> {
        match (Self::non_empty(&self.lat), Self::non_empty(&self.lng)) {
            (Some(lat), Some(lng)) => Ok(Some((
                parse_coordinate("lat", lat)?,
                parse_coordinate("lng", lng)?,
            ))),
            _ => Ok(None),
        }
    }
}

fn parse_coordinate(field: &str, raw: &str) -> ApiResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ApiError::invalid_format(field, "a decimal number"))
}

// ============================================================================
// CITY RESOLUTION
// ============================================================================

/// Pick the partition a lookup is served from.
///
/// An explicit city wins. Otherwise the closest place near the given
/// coordinates is used, and the configured default city when there are no
/// coordinates or the resolver finds nothing (or fails).
pub async fn resolve_city(
    query: &EventsQuery,
    geo: &dyn GeoResolver,
    settings: &LookupSettings,
) -> ApiResult<String> {
    if let Some(city) = EventsQuery::non_empty(&query.city) {
        return Ok(city.to_string());
    }

    let Some((lat, lng)) = query.coordinates()? else {
        return Ok(settings.default_city.clone());
    };

    match geo.nearby(lat, lng, settings.geo_radius_km).await {
        Ok(places) => Ok(places
            .into_iter()
            .find(|name| !name.trim().is_empty())
            .unwrap_or_else(|| settings.default_city.clone())),
        Err(e) => {
            tracing::warn!(lat, lng, error = %e, "Nearby city lookup failed; using default city");
            Ok(settings.default_city.clone())
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /events - Events for a city, sorted by start time
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<EventRecord>>> {
    let city = resolve_city(&query, state.geo.as_ref(), &state.lookup).await?;
    let resolution = state.dispatcher.resolve(&city, query.force_refresh()).await?;

    tracing::info!(
        city = %city,
        count = resolution.events.len(),
        freshness = resolution.freshness.label(),
        path = ?resolution.path,
        "Served events"
    );

    Ok(Json(resolution.events))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(get_events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poppin_core::{GeoError, PoppinResult};

    struct Places(PoppinResult<Vec<String>>);

    #[async_trait::async_trait]
    impl GeoResolver for Places {
        async fn nearby(&self, _lat: f64, _lng: f64, _radius_km: u32) -> PoppinResult<Vec<String>> {
            self.0.clone()
        }
    }

    fn settings() -> LookupSettings {
        LookupSettings {
            default_city: "Braunschweig".to_string(),
            geo_radius_km: 30,
        }
    }

    fn query(city: Option<&str>, lat: Option<&str>, lng: Option<&str>) -> EventsQuery {
        EventsQuery {
            city: city.map(String::from),
            lat: lat.map(String::from),
            lng: lng.map(String::from),
            force: None,
        }
    }

    #[tokio::test]
    async fn test_explicit_city_wins_over_coordinates() {
        let geo = Places(Ok(vec!["Hannover".to_string()]));
        let city = resolve_city(&query(Some("Testville"), Some("52.2"), Some("10.5")), &geo, &settings())
            .await
            .unwrap();
        assert_eq!(city, "Testville");
    }

    #[tokio::test]
    async fn test_coordinates_use_first_nearby_place() {
        let geo = Places(Ok(vec!["Wolfsburg".to_string(), "Gifhorn".to_string()]));
        let city = resolve_city(&query(None, Some("52.42"), Some("10.78")), &geo, &settings())
            .await
            .unwrap();
        assert_eq!(city, "Wolfsburg");
    }

    #[tokio::test]
    async fn test_no_nearby_place_falls_back_to_default() {
        let geo = Places(Ok(vec![]));
        let city = resolve_city(&query(None, Some("0"), Some("0")), &geo, &settings())
            .await
            .unwrap();
        assert_eq!(city, "Braunschweig");
    }

    #[tokio::test]
    async fn test_geo_failure_falls_back_to_default() {
        let geo = Places(Err(GeoError::RequestFailed {
            reason: "timeout".to_string(),
        }
        .into()));
        let city = resolve_city(&query(None, Some("1"), Some("2")), &geo, &settings())
            .await
            .unwrap();
        assert_eq!(city, "Braunschweig");
    }

    #[tokio::test]
    async fn test_single_coordinate_uses_default() {
        let geo = Places(Ok(vec!["Hannover".to_string()]));
        let city = resolve_city(&query(None, Some("52.2"), None), &geo, &settings())
            .await
            .unwrap();
        assert_eq!(city, "Braunschweig");
    }

    #[tokio::test]
    async fn test_bad_coordinate_is_invalid_format() {
        let geo = Places(Ok(vec![]));
        let err = resolve_city(&query(None, Some("north"), Some("10.5")), &geo, &settings())
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidFormat);
        assert!(err.message.contains("lat"));
    }

    #[test]
    fn test_force_flag_requires_exact_true() {
        let mut q = EventsQuery::default();
        assert!(!q.force_refresh());
        q.force = Some("1".to_string());
        assert!(!q.force_refresh());
        q.force = Some("true".to_string());
        assert!(q.force_refresh());
    }
}
