//! `reqwest`-backed transport for the tourdesk REST API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, multipart, Client, RequestBuilder};
use tracing::{debug, warn};

use crate::config::Config;
use crate::mutation::{EncodedBody, Part, PartContent};

use super::{Transport, TransportError};

/// Default base URL when none is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the tourdesk backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client against `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::with_timeout(config.api_base_url(), config.request_timeout())
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(header::ACCEPT, "application/json");
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn multipart_form(parts: Vec<Part>) -> Result<multipart::Form, TransportError> {
        let mut form = multipart::Form::new();
        for part in parts {
            form = match part.content {
                PartContent::Text(text) => form.text(part.name, text),
                PartContent::File(file) => {
                    let body = multipart::Part::bytes(file.bytes.to_vec())
                        .file_name(file.file_name)
                        .mime_str(&file.mime_type)
                        .map_err(|e| TransportError::InvalidResponse(format!("Invalid attachment type: {}", e)))?;
                    form.part(part.name, body)
                }
            };
        }
        Ok(form)
    }

    /// Check if response is successful, returning the body or a typed error.
    async fn read_body(response: reqwest::Response) -> Result<Bytes, TransportError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.bytes().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            let err = TransportError::from_status(status.as_u16(), &body);
            warn!(status = status.as_u16(), error = %err, "Request failed");
            Err(err)
        }
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn get(&self, path: &str) -> Result<Bytes, TransportError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.authorize(self.client.get(&url)).send().await?;
        Self::read_body(response).await
    }

    async fn post(&self, path: &str, body: EncodedBody) -> Result<Bytes, TransportError> {
        let url = self.url(path);
        let request = self.authorize(self.client.post(&url));
        let request = match body {
            EncodedBody::Json(value) => {
                debug!(url = %url, "POST json");
                request.json(&value)
            }
            EncodedBody::Multipart(parts) => {
                debug!(url = %url, parts = parts.len(), "POST multipart");
                request.multipart(Self::multipart_form(parts)?)
            }
        };
        let response = request.send().await?;
        Self::read_body(response).await
    }
}
