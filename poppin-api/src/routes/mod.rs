//! REST API Routes Module
//!
//! - `GET /events`: stale-while-revalidate event lookup
//! - `POST /trigger-fetch`: manual provider fetch for one city
//! - `GET /cities`, `PUT /cities/:name`: city registry
//! - `/health/*`: Kubernetes-compatible health checks
//!
//! Every route is served with a permissive CORS layer so browser clients on
//! any origin can call the API.

pub mod cities;
pub mod events;
pub mod health;
pub mod trigger;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .nest("/events", events::create_router())
        .nest("/trigger-fetch", trigger::create_router())
        .nest("/cities", cities::create_router())
        .nest("/health", health::create_router())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .with_state(state)
}

/// Allow every origin; the API carries no credentials.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
