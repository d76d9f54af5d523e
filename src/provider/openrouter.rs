use crate::error::AppError;
use crate::health::{HealthCheckResult, HealthChecker};
use crate::provider::config::ProviderConfig;
use crate::provider::{ByteStream, ChatRequest, ChatResponse, CompletionProvider};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// OpenRouter chat-completions client
#[derive(Clone)]
pub struct OpenRouterProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenRouterProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn health_checker(&self) -> Arc<ProviderHealthChecker> {
        Arc::new(ProviderHealthChecker {
            config: self.config.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn post(&self, request: &ChatRequest) -> RequestBuilder {
        self.client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key.trim())
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(request)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }
}

/// Turn a non-2xx response into a provider error, preferring the upstream error message
async fn error_from_response(response: Response) -> AppError {
    #[derive(Deserialize)]
    struct OpenRouterResponse {
        error: OpenRouterError,
    }

    #[derive(Deserialize)]
    struct OpenRouterError {
        message: String,
        #[serde(default)]
        code: serde_json::Value,
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match serde_json::from_str::<OpenRouterResponse>(&body) {
        Ok(parsed) if !parsed.error.message.is_empty() => {
            let detail = match parsed.error.code {
                serde_json::Value::Null => parsed.error.message,
                code => format!("{}: {}", code, parsed.error.message),
            };
            AppError::Provider(format!("OpenRouter API error: {} ({})", status.as_u16(), detail))
        }
        _ => AppError::Provider(format!("OpenRouter API error: {}", status.as_u16())),
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let mut request = request.clone();
        request.stream = false;

        debug!(model = %request.model, "Sending completion request");

        let response = self
            .post(&request)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("OpenRouter request failed: {}", e)))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            warn!(model = %request.model, error = %err, "Completion request rejected");
            return Err(err);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to read completion response: {}", e)))?;

        ChatResponse::from_body(&body)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ByteStream, AppError> {
        let mut request = request.clone();
        request.stream = true;

        debug!(model = %request.model, "Opening streaming completion");

        // Only the response head is bounded here; the relay applies an idle timeout per chunk
        let response = tokio::time::timeout(self.timeout(), self.post(&request).send())
            .await
            .map_err(|_| AppError::Provider("OpenRouter request timed out".to_string()))?
            .map_err(|e| AppError::Provider(format!("OpenRouter request failed: {}", e)))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            warn!(model = %request.model, error = %err, "Streaming request rejected");
            return Err(err);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| AppError::Provider(format!("Stream read failed: {}", e))))
            .boxed())
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

/// Reports whether the provider is configured; never calls upstream
pub struct ProviderHealthChecker {
    config: ProviderConfig,
}

#[async_trait]
impl HealthChecker for ProviderHealthChecker {
    fn name(&self) -> &str {
        "provider"
    }

    async fn check(&self) -> HealthCheckResult {
        let details = serde_json::json!({
            "base_url": self.config.base_url,
            "timeout_seconds": self.config.timeout_seconds,
        });

        if self.config.api_key.trim().is_empty() {
            HealthCheckResult::degraded_with_details("Provider API key is not configured".to_string(), details)
        } else {
            HealthCheckResult::healthy_with_details(details)
        }
    }
}
