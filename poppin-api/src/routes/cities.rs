//! City registry endpoints
//!
//! - `PUT /cities/:name` registers a city or changes its status
//! - `GET /cities` lists the active cities the periodic sweep refreshes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use poppin_storage::{CityRecord, CityStatus, DocumentStore};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCityRequest {
    pub status: CityStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCitiesResponse {
    pub cities: Vec<String>,
}

/// PUT /cities/:name - Register a city or change its status
pub async fn put_city(
    State(store): State<Arc<dyn DocumentStore>>,
    Path(name): Path<String>,
    Json(request): Json<UpdateCityRequest>,
) -> ApiResult<Json<CityRecord>> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::invalid_input("City name must not be empty"));
    }

    store.upsert_city(&name, request.status).await?;
    tracing::info!(city = %name, status = ?request.status, "City registry updated");

    Ok(Json(CityRecord {
        name,
        status: request.status,
    }))
}

/// GET /cities - Active cities, sorted by name
pub async fn list_active(
    State(store): State<Arc<dyn DocumentStore>>,
) -> ApiResult<Json<ActiveCitiesResponse>> {
    let cities = store.active_cities().await?;
    Ok(Json(ActiveCitiesResponse { cities }))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_active))
        .route("/:name", put(put_city))
}
