//! Authenticated HTTP client for the task backend.
//!
//! Thin wrapper over `reqwest`: builds the URL, attaches the bearer token
//! from the shared [`TokenStore`] when one is present, and normalizes every
//! non-success outcome into [`ApiError`]. Decoding lives in `decode_body` so
//! it can be tested without a socket.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::ApiError;
use crate::config::ClientConfig;
use crate::state::token::TokenStore;

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Build a client from typed config, reading tokens from `tokens`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unexpected`] if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::unexpected(None, format!("http client build failed: {e}")))?;
        Ok(Self { http, base_url: config.api_url.trim_end_matches('/').to_owned(), tokens })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(to_json(body)?)).await
    }

    pub(crate) async fn put<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T, ApiError> {
        self.request(Method::PUT, path, Some(to_json(body)?)).await
    }

    pub(crate) async fn patch<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T, ApiError> {
        self.request(Method::PATCH, path, Some(to_json(body)?)).await
    }

    /// DELETE, expecting an empty (usually 204) success.
    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let (status, text) = self.send(method, path, body).await?;
        decode_body(status, &text)
    }

    /// Send a request and return the status and body of a successful response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(u16, String), ApiError> {
        let url = join_url(&self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(token) = self.tokens.get() {
            request = request.bearer_auth(token);
        }
        if let Some(json) = body {
            request = request.json(&json);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(%method, %url, error = %e, "request did not reach backend");
            ApiError::transport(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        if !status.is_success() {
            let err = ApiError::from_response(status.as_u16(), &text);
            tracing::debug!(%method, %url, status = status.as_u16(), kind = ?err.kind(), "request rejected");
            return Err(err);
        }

        tracing::debug!(%method, %url, status = status.as_u16(), "request ok");
        Ok((status.as_u16(), text))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn to_json(body: &impl Serialize) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::unexpected(None, format!("request encode failed: {e}")))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Decode a success body. An empty body (204) decodes as JSON `null`, so
/// `T = ()` and `Option<_>` targets accept it.
pub(crate) fn decode_body<T: DeserializeOwned>(status: u16, text: &str) -> Result<T, ApiError> {
    let source = if status == 204 || text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(source).map_err(|e| ApiError::unexpected(Some(status), format!("response decode failed: {e}")))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
