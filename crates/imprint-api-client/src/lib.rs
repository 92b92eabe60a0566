//! HTTP client for the Imprint ingestion endpoint.
//!
//! Provides a minimal client with configurable auth (Bearer token or X-API-Key)
//! and a multipart POST helper, plus the batch ingestion layer in [`ingest`].

pub mod ingest;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use imprint_core::SessionConfig;

pub use ingest::{
    BatchItem, BatchReceipt, FileOutcome, IngestBatch, IngestionClient, IngestionEndpoint,
    TransportError,
};

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

/// HTTP client for the ingestion service with optional auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Option<Auth>,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Option<Auth>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Create a client from session config. Returns `None` when no API URL is set.
    /// A bearer token wins over an API key when both are configured.
    pub fn from_config(config: &SessionConfig) -> Result<Option<Self>> {
        let Some(base_url) = config.api_url.clone() else {
            return Ok(None);
        };

        let auth = config
            .bearer_token
            .clone()
            .map(Auth::Bearer)
            .or_else(|| config.api_key.clone().map(Auth::XApiKey));

        Self::new(base_url, auth, config.ingest_timeout()).map(Some)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(Auth::Bearer(token)) => {
                request.header("Authorization", format!("Bearer {}", token))
            }
            Some(Auth::XApiKey(key)) => request.header("X-API-Key", key.as_str()),
            None => request,
        }
    }

    /// POST multipart form and deserialize the JSON response.
    ///
    /// Any non-2xx status is an error carrying the response body.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, TransportError> {
        let url = self.build_url(path);
        let request = self.client.post(&url).multipart(form);
        let request = self.apply_auth(request);

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status,
                body: error_text,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_api_url_means_no_client() {
        let client = ApiClient::from_config(&SessionConfig::default()).unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn bearer_token_wins_over_api_key() {
        let config = SessionConfig {
            api_url: Some("http://localhost:9000/".to_string()),
            api_key: Some("key".to_string()),
            bearer_token: Some("token".to_string()),
            ..SessionConfig::default()
        };
        let client = ApiClient::from_config(&config).unwrap().unwrap();
        assert!(matches!(client.auth, Some(Auth::Bearer(ref t)) if t == "token"));
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.build_url("/ingest"), "http://localhost:9000/ingest");
    }

    #[tokio::test]
    async fn sends_api_key_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/echo")
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = ApiClient::new(
            server.url(),
            Some(Auth::XApiKey("secret".to_string())),
            Duration::from_secs(5),
        )
        .unwrap();
        let form = reqwest::multipart::Form::new().text("field", "value");
        let body: serde_json::Value = client.post_multipart("/echo", form).await.unwrap();

        assert_eq!(body["ok"], true);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/echo")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), None, Duration::from_secs(5)).unwrap();
        let form = reqwest::multipart::Form::new().text("field", "value");
        let err = client
            .post_multipart::<serde_json::Value>("/echo", form)
            .await
            .unwrap_err();

        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
