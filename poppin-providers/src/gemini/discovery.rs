//! Event discovery backed by a Gemini model.

use async_trait::async_trait;
use poppin_core::{ContentDiscoveryProvider, PoppinResult, ProviderError};
use tracing::{debug, warn};

use super::client::{GeminiClient, PROVIDER_NAME};
use super::types::GenerateContentRequest;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Build the discovery prompt for `place`.
pub fn build_prompt(place: &str) -> String {
    format!(
        "Find as many upcoming events as possible in {place} for the next 7 days. \
         Aim for at least 30 events if available. \
         Include: Title, Date, Location, Category, and a short Description. \
         Return the result ONLY as a JSON list of objects. \
         Keys: 'title', 'description', 'category', 'startTime', 'address'."
    )
}

/// [`ContentDiscoveryProvider`] that asks Gemini, grounded with Google
/// Search, for upcoming events.
///
/// Without an API key every query fails with
/// [`ProviderError::NotConfigured`], which lookups degrade past.
#[derive(Debug)]
pub struct GeminiDiscoveryProvider {
    client: Option<GeminiClient>,
    model: String,
}

impl GeminiDiscoveryProvider {
    /// Create a provider.
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key, if configured
    /// * `model` - Model name (e.g., "gemini-2.5-flash")
    /// * `requests_per_minute` - Client-side rate limit
    pub fn new(api_key: Option<String>, model: impl Into<String>, requests_per_minute: u32) -> Self {
        let client = api_key
            .filter(|key| !key.trim().is_empty())
            .map(|key| GeminiClient::new(key, requests_per_minute));
        Self {
            client,
            model: model.into(),
        }
    }

    /// Create a provider around an existing client.
    pub fn with_client(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client: Some(client),
            model: model.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn ask(&self, client: &GeminiClient, request: &GenerateContentRequest) -> PoppinResult<String> {
        let response = client.generate(&self.model, request).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: PROVIDER_NAME.to_string(),
            }
            .into());
        }
        Ok(text)
    }
}

#[async_trait]
impl ContentDiscoveryProvider for GeminiDiscoveryProvider {
    async fn query(&self, place: &str) -> PoppinResult<String> {
        let Some(client) = &self.client else {
            return Err(ProviderError::NotConfigured {
                provider: PROVIDER_NAME.to_string(),
                reason: "GEMINI_API_KEY is not set".to_string(),
            }
            .into());
        };

        let plain = GenerateContentRequest::prompt(build_prompt(place));
        let grounded = plain.clone().with_google_search();

        match self.ask(client, &grounded).await {
            Ok(text) => {
                debug!(city = %place, chars = text.len(), "Grounded discovery answered");
                Ok(text)
            }
            Err(e) => {
                warn!(
                    city = %place,
                    error = %e,
                    "Grounded discovery failed; retrying without search tool"
                );
                self.ask(client, &plain).await
            }
        }
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use poppin_core::PoppinError;
    use serde_json::json;

    #[test]
    fn test_prompt_names_place_and_keys() {
        let prompt = build_prompt("Braunschweig");
        assert!(prompt.contains("in Braunschweig for the next 7 days"));
        assert!(prompt.contains("'startTime'"));
        assert!(prompt.contains("JSON list"));
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        assert!(!GeminiDiscoveryProvider::new(None, DEFAULT_MODEL, 30).is_configured());
        assert!(!GeminiDiscoveryProvider::new(Some("  ".to_string()), DEFAULT_MODEL, 30).is_configured());
        assert!(GeminiDiscoveryProvider::new(Some("k".to_string()), DEFAULT_MODEL, 30).is_configured());
    }

    #[tokio::test]
    async fn test_query_without_key_fails_degradably() {
        let provider = GeminiDiscoveryProvider::new(None, DEFAULT_MODEL, 30);

        let err = provider.query("Braunschweig").await.unwrap_err();

        assert!(matches!(
            err,
            PoppinError::Provider(ProviderError::NotConfigured { .. })
        ));
        assert!(err.is_degradable());
    }

    const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";

    fn answer(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]}
            }]
        })
    }

    fn provider_for(server: &MockServer) -> GeminiDiscoveryProvider {
        let client = GeminiClient::new("test-key", 6000).with_base_url(server.base_url());
        GeminiDiscoveryProvider::with_client(client, DEFAULT_MODEL)
    }

    #[tokio::test]
    async fn test_failed_grounded_call_retries_once_without_tools() {
        let server = MockServer::start();
        let grounded = server.mock(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .header("x-goog-api-key", "test-key")
                .body_includes("google_search");
            then.status(500).body("grounding backend unavailable");
        });
        let plain = server.mock(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .body_excludes("\"tools\"");
            then.status(200).json_body(answer("[]"));
        });

        let text = provider_for(&server).query("Braunschweig").await.unwrap();

        assert_eq!(text, "[]");
        grounded.assert_calls(1);
        plain.assert_calls(1);
    }

    #[tokio::test]
    async fn test_retry_failure_surfaces_after_two_calls() {
        let server = MockServer::start();
        let grounded = server.mock(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .body_includes("google_search");
            then.status(500).body("grounding backend unavailable");
        });
        let plain = server.mock(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .body_excludes("\"tools\"");
            then.status(503).body("model overloaded");
        });

        let err = provider_for(&server).query("Braunschweig").await.unwrap_err();

        assert!(matches!(
            err,
            PoppinError::Provider(ProviderError::RequestFailed { status: 503, .. })
        ));
        grounded.assert_calls(1);
        plain.assert_calls(1);
    }

    #[tokio::test]
    async fn test_successful_grounded_call_does_not_retry() {
        let server = MockServer::start();
        let grounded = server.mock(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .body_includes("google_search");
            then.status(200).json_body(answer("```json\n[]\n```"));
        });
        let plain = server.mock(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .body_excludes("\"tools\"");
            then.status(200).json_body(answer("ungrounded"));
        });

        let text = provider_for(&server).query("Braunschweig").await.unwrap();

        assert_eq!(text, "```json\n[]\n```");
        grounded.assert_calls(1);
        plain.assert_calls(0);
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let provider = GeminiDiscoveryProvider::new(Some("super-secret".to_string()), DEFAULT_MODEL, 30);
        assert!(!format!("{provider:?}").contains("super-secret"));
    }
}
