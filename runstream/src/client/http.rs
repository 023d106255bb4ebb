//! Control-plane client trait and its reqwest implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use super::error::ApiError;
use crate::model::ErrorResponse;

/// A streamed response body, delivered in arbitrarily sized fragments.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

/// Default timeout for request/response calls (not applied to streams).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout, applied to every request including streams.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("runstream/", env!("CARGO_PKG_VERSION"));

/// Requests against the job-execution service.
///
/// Paths are relative to the server URI, e.g. `v1/runs/12?watch=true`.
/// Implementations attach authentication and map non-success responses to
/// [`ApiError::Status`].
pub trait ControlPlane: Send + Sync {
    /// `GET` a JSON document.
    fn get_json<T: DeserializeOwned + Send>(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<T, ApiError>> + Send;

    /// `POST` an optional JSON body and decode a JSON response.
    fn post_json<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> impl Future<Output = Result<T, ApiError>> + Send;

    /// `GET` a long-lived response and hand back its body as a byte stream.
    fn open_stream(&self, path: &str) -> impl Future<Output = Result<ByteStream, ApiError>> + Send;
}

/// [`ControlPlane`] over HTTP(S) using reqwest.
#[derive(Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    server_uri: Url,
    token: Option<String>,
    request_timeout: Duration,
}

impl std::fmt::Debug for HttpControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The bearer token is never printed.
        f.debug_struct("HttpControlPlane")
            .field("server_uri", &self.server_uri.as_str())
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl HttpControlPlane {
    /// Create a client for the given server.
    pub fn new(server_uri: &str, token: Option<String>) -> Result<Self, ApiError> {
        let server_uri = Url::parse(server_uri)
            .map_err(|e| ApiError::NotConfigured(format!("invalid server URI: {}", e)))?;
        if server_uri.cannot_be_a_base() {
            return Err(ApiError::NotConfigured(
                "server URI must be an absolute http(s) URI".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Connect(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server_uri,
            token,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Override the timeout used for non-streaming calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.server_uri.as_str().trim_end_matches('/');
        let joined = format!("{}/{}", base, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| ApiError::NotConfigured(e.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            warn!(
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "Control plane request failed"
            );
            ApiError::Connect(e.to_string())
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url().path(), "Control plane response");

        if status.is_success() {
            Ok(response)
        } else {
            Err(error_from_response(status, response).await)
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Stream(e.to_string()))?;
        trace!(bytes = body.len(), "Control plane body read");
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Map a non-success response to an [`ApiError::Status`], using the service
/// error envelope when the body carries one.
async fn error_from_response(status: StatusCode, response: reqwest::Response) -> ApiError {
    let message = match response.bytes().await {
        Ok(body) => match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(envelope) => format!("{}: {}", envelope.error.code, envelope.error.message),
            Err(_) => format!("unexpected status code {}", status),
        },
        Err(_) => format!("unexpected status code {}", status),
    };
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

impl ControlPlane for HttpControlPlane {
    async fn get_json<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let request = self
            .request(Method::GET, url)
            .timeout(self.request_timeout);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let mut request = self
            .request(Method::POST, url)
            .timeout(self.request_timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn open_stream(&self, path: &str) -> Result<ByteStream, ApiError> {
        let url = self.url(path)?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ApiError::Stream(e.to_string())));
        Ok(Box::pin(stream))
    }
}
