//! Gemini HTTP client with rate limiting

use super::types::{ApiError, GenerateContentRequest, GenerateContentResponse};
use poppin_core::{PoppinResult, ProviderError};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

pub(crate) const PROVIDER_NAME: &str = "gemini";

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Grounded searches routinely take tens of seconds.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini API client with rate limiting.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<Semaphore>,
    last_request: Mutex<Option<Instant>>,
    min_request_interval: Duration,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key
    /// * `requests_per_minute` - Maximum requests per minute
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        let min_interval_ms = (60_000 / u64::from(rpm)).max(10);
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limiter: Arc::new(Semaphore::new(rpm as usize)),
            last_request: Mutex::new(None),
            min_request_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the `generateContent` method for `model`.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    // Sleeps until the minimum spacing since the previous request has passed.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_request_interval {
                tokio::time::sleep(self.min_request_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Call `generateContent` on `model` with automatic rate limiting.
    pub async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> PoppinResult<GenerateContentResponse> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
            })?;
        self.pace().await;

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME.to_string(),
                status: e.status().map_or(0, |s| s.as_u16()),
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                ProviderError::InvalidResponse {
                    provider: PROVIDER_NAME.to_string(),
                    reason: format!("Failed to parse response: {e}"),
                }
                .into()
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(error_for_status(status, &error_text).into())
    }
}

/// Map a non-success status and body to a provider error.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
        };
    }

    let message = serde_json::from_str::<ApiError>(body)
        .map(|api_error| api_error.error.message)
        .unwrap_or_else(|_| body.to_string());
    ProviderError::RequestFailed {
        provider: PROVIDER_NAME.to_string(),
        status: status.as_u16(),
        message,
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("min_request_interval", &self.min_request_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_api_key() {
        let client = GeminiClient::new("super-secret", 30);
        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_endpoint_uses_model_method_path() {
        let client = GeminiClient::new("k", 30).with_base_url("http://localhost:9999/v1beta/");
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_min_interval_from_rpm() {
        assert_eq!(
            GeminiClient::new("k", 30).min_request_interval,
            Duration::from_secs(2)
        );
        // Zero is clamped to one request per minute.
        assert_eq!(
            GeminiClient::new("k", 0).min_request_interval,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_error_for_status_extracts_api_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            error_for_status(StatusCode::BAD_REQUEST, body),
            ProviderError::RequestFailed {
                provider: "gemini".to_string(),
                status: 400,
                message: "API key not valid".to_string(),
            }
        );
    }

    #[test]
    fn test_error_for_status_rate_limited() {
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited { .. }
        ));
    }

    #[test]
    fn test_error_for_status_plain_body() {
        match error_for_status(StatusCode::BAD_GATEWAY, "upstream down") {
            ProviderError::RequestFailed { status, message, .. } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_failed() {
        let client = GeminiClient::new("k", 600).with_base_url("http://127.0.0.1:9");
        let err = client
            .generate("m", &GenerateContentRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            poppin_core::PoppinError::Provider(ProviderError::RequestFailed { .. })
        ));
    }
}
