//! Manual fetch endpoint
//!
//! `POST /trigger-fetch` queries the provider for one city and merge-ingests
//! the answer, echoing a preview of the raw provider text. Used for debugging
//! and seeding a city by hand.

use axum::{extract::State, routing::post, Json, Router};
use poppin_storage::RefreshDispatcher;
use serde::{Deserialize, Serialize};

use crate::constants::RAW_RESPONSE_PREVIEW_CHARS;
use crate::error::ApiResult;
use crate::state::{AppState, LookupSettings};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerFetchRequest {
    #[serde(default)]
    pub city: Option<String>,
}

/// Outcome of a manual fetch.
///
/// Provider and parse failures are reported in the body with a 200, the way
/// a callable function reports them; only store failures become HTTP errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerFetchResponse {
    #[serde(rename_all = "camelCase")]
    Fetched {
        city: String,
        count: usize,
        raw_response: String,
    },
    Failed {
        city: String,
        error: String,
    },
}

/// First `RAW_RESPONSE_PREVIEW_CHARS` characters of `raw`, followed by `...`.
pub fn preview(raw: &str) -> String {
    let mut preview: String = raw.chars().take(RAW_RESPONSE_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /trigger-fetch - Fetch and save events for a city
pub async fn trigger_fetch(
    State(dispatcher): State<RefreshDispatcher>,
    State(settings): State<std::sync::Arc<LookupSettings>>,
    body: Option<Json<TriggerFetchRequest>>,
) -> ApiResult<Json<TriggerFetchResponse>> {
    let city = body
        .and_then(|Json(request)| request.city)
        .filter(|city| !city.trim().is_empty())
        .unwrap_or_else(|| settings.default_city.clone());

    Ok(Json(fetch_for(&dispatcher, city).await?))
}

/// Query the provider for `city` and merge-ingest the answer.
pub async fn fetch_for(
    dispatcher: &RefreshDispatcher,
    city: String,
) -> ApiResult<TriggerFetchResponse> {
    let raw = match dispatcher.provider().query(&city).await {
        Ok(raw) => raw,
        Err(e) if e.is_degradable() => {
            tracing::warn!(city = %city, error = %e, "Manual fetch: provider failed");
            return Ok(TriggerFetchResponse::Failed {
                city,
                error: e.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    match dispatcher.ingestor().ingest(&city, &raw).await {
        Ok(count) => {
            tracing::info!(city = %city, count, "Manual fetch saved events");
            Ok(TriggerFetchResponse::Fetched {
                city,
                count,
                raw_response: preview(&raw),
            })
        }
        Err(e) if e.is_degradable() => {
            tracing::warn!(city = %city, error = %e, "Manual fetch: unparseable answer");
            Ok(TriggerFetchResponse::Failed {
                city,
                error: e.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", post(trigger_fetch))
}
