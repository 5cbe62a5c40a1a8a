//! HTTP client for the `OpenMemory` REST API.

use super::MemoryStore;
use crate::config::StoreConfig;
use crate::models::{DeleteRequest, DeleteResponse, FilterRequest, MemoryId, MemoryPage};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// `OpenMemory` store reached over HTTPS with a bearer token.
pub struct OpenMemoryClient {
    /// API base URL, without trailing slash.
    base_url: String,
    /// Bearer token.
    bearer_token: SecretString,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenMemoryClient {
    /// Default API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openmemory.dev/api/v1";

    /// Creates a client for the given base URL and token.
    #[must_use]
    pub fn new(base_url: impl Into<String>, bearer_token: SecretString) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Creates a client from store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no bearer token is configured.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let token = config
            .bearer_token
            .clone()
            .ok_or_else(|| Error::Config("OPENMEMORY_BEARER_TOKEN not set".to_string()))?;

        let mut builder = reqwest::blocking::Client::builder();
        if config.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_ms));
        }
        let client = builder.build().map_err(|e| Error::OperationFailed {
            operation: "build_store_client".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: token,
            client,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a JSON request and decodes the JSON response.
    fn send<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
        operation: &str,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.bearer_token.expose_secret())
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .map_err(|e| Error::OperationFailed {
                operation: operation.to_string(),
                cause: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Unauthorized(format!(
                "memory store rejected bearer token: {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let text = response.text().map_err(|e| Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        })?;
        decode_response(&text, operation)
    }
}

impl MemoryStore for OpenMemoryClient {
    fn name(&self) -> &'static str {
        "openmemory"
    }

    fn fetch_page(&self, request: &FilterRequest) -> Result<MemoryPage> {
        self.send(
            reqwest::Method::POST,
            "/memories/filter",
            request,
            "openmemory_fetch_page",
        )
    }

    fn delete_memories(&self, ids: &[MemoryId]) -> Result<DeleteResponse> {
        let request = DeleteRequest {
            memory_ids: ids.to_vec(),
        };
        self.send(
            reqwest::Method::DELETE,
            "/memories/",
            &request,
            "openmemory_delete",
        )
    }
}

/// Decodes a response body, reporting schema mismatches as failures.
fn decode_response<T: DeserializeOwned>(body: &str, operation: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("unexpected response shape: {e}"),
    })
}
