//! The API client consumed by the session layer and entity wrappers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use uuid::Uuid;

use vitrina_core::{BearerSource, Envelope};

use crate::normalize;

/// Client-side request deadline. Past it the call reports as a timeout,
/// which is distinct from a connectivity failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the storefront API.
///
/// Builds one `reqwest::Client` with JSON defaults, attaches
/// `Authorization: Bearer <token>` whenever the bearer source yields one,
/// and funnels every outcome through [`normalize`], so callers only ever
/// see [`Envelope`] values.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    bearer: Arc<dyn BearerSource>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, bearer: Arc<dyn BearerSource>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, bearer, REQUEST_TIMEOUT)
    }

    /// Create a client with an explicit request deadline.
    pub fn with_timeout(
        base_url: impl Into<String>,
        bearer: Arc<dyn BearerSource>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            http,
            bearer,
        })
    }

    /// POST a JSON body.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Envelope {
        let req = self.http.post(self.url(path)).json(body);
        self.dispatch("POST", path, req).await
    }

    /// POST with no body (logout/refresh/me-style endpoints).
    pub async fn post_empty(&self, path: &str) -> Envelope {
        let req = self.http.post(self.url(path));
        self.dispatch("POST", path, req).await
    }

    pub async fn get(&self, path: &str) -> Envelope {
        let req = self.http.get(self.url(path));
        self.dispatch("GET", path, req).await
    }

    /// GET an opaque payload (exports, images). The raw bytes pass through
    /// un-unwrapped; failures still arrive as a normalized envelope.
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, Envelope> {
        let req = self.authorize(self.http.get(self.url(path)));
        match req.send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => Ok(bytes.to_vec()),
                Err(err) => Err(normalize::transport_failure(&err)),
            },
            Ok(resp) => Err(normalize::http_failure(resp).await),
            Err(err) => Err(normalize::transport_failure(&err)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer.bearer_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn dispatch(&self, method: &str, path: &str, req: reqwest::RequestBuilder) -> Envelope {
        let request_id = Uuid::now_v7();
        let envelope = match self.authorize(req).send().await {
            Ok(resp) => normalize::response(resp).await,
            Err(err) => normalize::transport_failure(&err),
        };

        if envelope.success {
            tracing::debug!(%request_id, method, path, status = envelope.status, "request completed");
        } else {
            tracing::warn!(
                %request_id,
                method,
                path,
                status = envelope.status,
                message = %envelope.message,
                "request failed"
            );
        }

        envelope
    }
}
