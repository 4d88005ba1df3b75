use std::future::Future;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde::Serialize;

use super::error::ProviderError;
use super::types::{InferenceRequest, MetadataPayload};

pub const API_URL: &str = "https://api.vistalens.dev/v1";

/// Abstraction over the inference provider, so retry policy and the
/// scheduler can be exercised with a fake in tests.
pub trait InferenceProvider: Send + Sync {
    /// Perform exactly one inference call with the given credential.
    fn send(
        &self,
        credential: &str,
        request: &InferenceRequest,
    ) -> impl Future<Output = Result<MetadataPayload, ProviderError>> + Send;

    /// Cheap authenticated call to verify a credential is usable.
    fn probe(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// HTTP client for the provider's describe endpoint.
pub struct ProviderClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct DescribeBody<'a> {
    model: &'a str,
    file_name: String,
    category: &'a str,
    content: String,
    max_keywords: u32,
    thinking: bool,
}

impl ProviderClient {
    pub fn new() -> Self {
        Self::with_base_url(API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self { client, base_url }
    }

    async fn classify_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceProvider for ProviderClient {
    async fn send(
        &self,
        credential: &str,
        request: &InferenceRequest,
    ) -> Result<MetadataPayload, ProviderError> {
        let bytes = tokio::fs::read(&request.path).await?;
        let file_name = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let body = DescribeBody {
            model: &request.model,
            file_name,
            category: request.category.as_str(),
            content: general_purpose::STANDARD.encode(&bytes),
            max_keywords: request.max_keywords,
            thinking: request.thinking,
        };

        let response = self
            .client
            .post(format!("{}/describe", self.base_url))
            .header("x-api-key", credential)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let response = Self::classify_status(response).await?;
        let text = response.text().await?;
        serde_json::from_str::<MetadataPayload>(&text)
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    async fn probe(&self, credential: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("x-api-key", credential)
            .send()
            .await?;
        Self::classify_status(response).await.map(|_| ())
    }
}
