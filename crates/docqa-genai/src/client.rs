//! Thin Gemini REST client shared by the generation and embedding adapters.
//!
//! Every request carries an explicit timeout. Transport failures, non-2xx
//! statuses and undecodable bodies are mapped onto the workspace error type
//! once, here, so callers never see `reqwest` errors.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docqa_core::config::GenAiSettings;
use docqa_core::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_base: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiClient {
    pub fn new(settings: &GenAiSettings) -> Result<Self> {
        let api_key = settings.require_api_key()?.to_string();
        Self::with_endpoint(&settings.api_base, &api_key, Duration::from_secs(settings.timeout_secs))
    }

    /// Client against an explicit endpoint, e.g. a local test server.
    pub fn with_endpoint(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    pub fn api_base(&self) -> &str { &self.api_base }

    pub fn timeout(&self) -> Duration { self.timeout }

    /// POST `body` to `models/{model}:{method}` and decode the JSON reply.
    ///
    /// `service` names the collaborator in error messages.
    pub async fn call<Req, Resp>(&self, service: &str, model: &str, method: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/models/{}:{}", self.api_base, model_path(model), method);
        debug!("POST {} ({})", url, service);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(service, e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(service, e))?;
        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| format!("{} {}", b.error.status, b.error.message).trim().to_string())
                .unwrap_or_else(|_| text.chars().take(200).collect());
            return Err(Error::Generation(format!("{service} returned {status}: {detail}")));
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::Generation(format!("{service} sent an undecodable response: {e}")))
    }

    fn transport_error(&self, service: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::CollaboratorTimeout { service: service.to_string(), timeout: self.timeout }
        } else {
            Error::Generation(format!("{service} unreachable: {e}"))
        }
    }
}

/// Accept both `gemini-2.0-flash` and `models/gemini-2.0-flash`.
pub(crate) fn model_path(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_path_strips_prefix() {
        assert_eq!(model_path("models/text-embedding-004"), "text-embedding-004");
        assert_eq!(model_path("gemini-2.0-flash"), "gemini-2.0-flash");
    }

    #[test]
    fn endpoint_is_normalised() {
        let client = GeminiClient::with_endpoint("http://localhost:8081/", "k", Duration::from_secs(5)).unwrap();
        assert_eq!(client.api_base(), "http://localhost:8081");
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let settings = GenAiSettings::default();
        assert!(matches!(GeminiClient::new(&settings), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_reported() {
        let client = GeminiClient::with_endpoint("http://127.0.0.1:9", "k", Duration::from_secs(5)).unwrap();
        let res: Result<serde_json::Value> = client.call("generation", "m", "generateContent", &serde_json::json!({})).await;
        assert!(matches!(res, Err(Error::Generation(_)) | Err(Error::CollaboratorTimeout { .. })));
    }
}
