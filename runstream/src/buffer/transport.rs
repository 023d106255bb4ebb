//! Block transport: one HTTP request per block.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::trace;

use super::uri::CapabilityUri;

const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";
const BLOCK_BLOB: &str = "BlockBlob";

/// Failure of a single block request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, timeout, body errors and 408/429/5xx responses.
    #[error("transient block error: {0}")]
    Transient(String),

    /// The block does not exist (yet).
    #[error("block not found")]
    NotFound,

    /// Any other client error, or a request that cannot be built.
    #[error("block request failed: {0}")]
    Fatal(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound)
    }

    /// Classify a response status that is not a success.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => TransportError::NotFound,
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                TransportError::Transient(format!("unexpected status code {}", status.as_u16()))
            }
            s if s.is_server_error() => {
                TransportError::Transient(format!("unexpected status code {}", s.as_u16()))
            }
            s => TransportError::Fatal(format!("unexpected status code {}", s.as_u16())),
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        // The URL carries the capability credential.
        let err = err.without_url();
        if err.is_builder() {
            TransportError::Fatal(err.to_string())
        } else {
            TransportError::Transient(err.to_string())
        }
    }
}

/// Upload and download of individual blocks of a buffer.
///
/// Implementations perform exactly one attempt per call; retry policy lives
/// in the transfer engine.
pub trait BlockTransport: Send + Sync + 'static {
    /// Store `data` as block `index`.
    fn put_block(
        &self,
        uri: &CapabilityUri,
        index: u64,
        data: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Fetch block `index`. A zero-length result is the terminal block.
    fn get_block(
        &self,
        uri: &CapabilityUri,
        index: u64,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

/// [`BlockTransport`] against a blob endpoint over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpBlockTransport {
    client: reqwest::Client,
}

impl HttpBlockTransport {
    /// Create a transport whose requests time out after `block_timeout`.
    pub fn new(block_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(block_timeout)
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(concat!("runstream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::from_reqwest)?;
        Ok(Self { client })
    }
}

impl BlockTransport for HttpBlockTransport {
    async fn put_block(
        &self,
        uri: &CapabilityUri,
        index: u64,
        data: Bytes,
    ) -> Result<(), TransportError> {
        let len = data.len();
        let response = self
            .client
            .put(uri.block_url(index))
            .header(BLOB_TYPE_HEADER, BLOCK_BLOB)
            .body(data)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        trace!(index, bytes = len, status = status.as_u16(), "Block uploaded");
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::from_status(status))
        }
    }

    async fn get_block(&self, uri: &CapabilityUri, index: u64) -> Result<Bytes, TransportError> {
        let response = self
            .client
            .get(uri.block_url(index))
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::from_status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(TransportError::from_reqwest)?;
        trace!(index, bytes = body.len(), "Block downloaded");
        Ok(body)
    }
}
