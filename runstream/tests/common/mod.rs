//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{stream, Stream};
use runstream::buffer::{BlockTransport, CapabilityUri, TransportError};
use runstream::client::{ApiError, ByteStream, ControlPlane};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWrite;

// =============================================================================
// In-memory block store
// =============================================================================

/// Block store keyed by buffer path and index, with per-block delays so
/// requests complete out of order.
#[derive(Default)]
pub struct MemoryTransport {
    blocks: Mutex<HashMap<(String, u64), Bytes>>,
    seed: u64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays derived from `seed` instead of the default.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    /// Store a whole buffer as if it had been written with `block_size`.
    pub fn preload(&self, uri: &CapabilityUri, data: &[u8], block_size: usize) {
        let mut blocks = self.blocks.lock().unwrap();
        let key = uri.redacted();
        let mut index = 0u64;
        for chunk in data.chunks(block_size) {
            blocks.insert((key.clone(), index), Bytes::copy_from_slice(chunk));
            index += 1;
        }
        blocks.insert((key, index), Bytes::new());
    }

    /// Blocks of one buffer in index order.
    pub fn blocks_of(&self, uri: &CapabilityUri) -> Vec<(u64, Bytes)> {
        let key = uri.redacted();
        let mut blocks: Vec<(u64, Bytes)> = self
            .blocks
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, _), _)| *k == key)
            .map(|((_, i), b)| (*i, b.clone()))
            .collect();
        blocks.sort_by_key(|(i, _)| *i);
        blocks
    }

    /// Concatenated data blocks of one buffer.
    pub fn contents_of(&self, uri: &CapabilityUri) -> Vec<u8> {
        self.blocks_of(uri)
            .into_iter()
            .flat_map(|(_, b)| b.to_vec())
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn delay(&self, index: u64) -> Duration {
        let mixed = index
            .wrapping_add(self.seed)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .rotate_left(17);
        Duration::from_micros(mixed % 3000)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BlockTransport for MemoryTransport {
    async fn put_block(
        &self,
        uri: &CapabilityUri,
        index: u64,
        data: Bytes,
    ) -> Result<(), TransportError> {
        self.enter();
        self.puts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay(index)).await;
        self.blocks
            .lock()
            .unwrap()
            .insert((uri.redacted(), index), data);
        self.exit();
        Ok(())
    }

    async fn get_block(&self, uri: &CapabilityUri, index: u64) -> Result<Bytes, TransportError> {
        self.enter();
        self.gets.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay(index)).await;
        let block = self
            .blocks
            .lock()
            .unwrap()
            .get(&(uri.redacted(), index))
            .cloned();
        self.exit();
        block.ok_or(TransportError::NotFound)
    }
}

// =============================================================================
// Scripted control plane
// =============================================================================

/// One scripted response to `open_stream`.
pub enum StreamScript {
    /// The request itself fails.
    Fail(ApiError),
    /// The body yields these chunks and then ends.
    Body(Vec<Result<Bytes, ApiError>>),
    /// The body yields these chunks and then stays open.
    Open(Vec<Result<Bytes, ApiError>>),
}

impl StreamScript {
    pub fn lines(lines: &[&str]) -> Self {
        StreamScript::Body(
            lines
                .iter()
                .map(|l| Ok(Bytes::from(format!("{}\n", l))))
                .collect(),
        )
    }
}

/// Control plane answering from per-path queues and recording every request
/// as `"METHOD path"`.
#[derive(Default)]
pub struct ScriptedControlPlane {
    json: Mutex<HashMap<String, VecDeque<Result<serde_json::Value, ApiError>>>>,
    streams: Mutex<HashMap<String, VecDeque<StreamScript>>>,
    requests: Mutex<Vec<String>>,
    bodies: Mutex<Vec<serde_json::Value>>,
    live_streams: Arc<AtomicUsize>,
}

impl ScriptedControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON answer for `"GET path"` or `"POST path"`.
    pub fn respond(&self, request: &str, response: Result<serde_json::Value, ApiError>) {
        self.json
            .lock()
            .unwrap()
            .entry(request.to_string())
            .or_default()
            .push_back(response);
    }

    /// Queue a stream answer for a path, matched without its query string.
    pub fn stream(&self, path: &str, script: StreamScript) {
        self.streams
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(script);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_requests(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }

    pub fn posted_bodies(&self) -> Vec<serde_json::Value> {
        self.bodies.lock().unwrap().clone()
    }

    /// Stream bodies handed out and not yet dropped.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    fn track(&self, inner: ByteStream) -> ByteStream {
        self.live_streams.fetch_add(1, Ordering::SeqCst);
        Box::pin(TrackedStream {
            inner,
            live: Arc::clone(&self.live_streams),
        })
    }

    fn answer<T: DeserializeOwned>(&self, key: String) -> Result<T, ApiError> {
        self.requests.lock().unwrap().push(key.clone());
        let next = self
            .json
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(value)) => {
                serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
            }
            Some(Err(e)) => Err(e),
            None => Err(ApiError::Status {
                status: 404,
                message: format!("NotFound: no script for {}", key),
            }),
        }
    }
}

impl ControlPlane for ScriptedControlPlane {
    async fn get_json<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T, ApiError> {
        self.answer(format!("GET {}", path))
    }

    async fn post_json<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        if let Some(body) = body {
            self.bodies.lock().unwrap().push(body);
        }
        self.answer(format!("POST {}", path))
    }

    async fn open_stream(&self, path: &str) -> Result<ByteStream, ApiError> {
        self.requests.lock().unwrap().push(format!("STREAM {}", path));
        let base = path.split('?').next().unwrap_or(path).to_string();
        let script = self
            .streams
            .lock()
            .unwrap()
            .get_mut(&base)
            .and_then(VecDeque::pop_front);

        match script {
            Some(StreamScript::Fail(e)) => Err(e),
            Some(StreamScript::Body(chunks)) => Ok(self.track(Box::pin(stream::iter(chunks)))),
            Some(StreamScript::Open(chunks)) => Ok(self.track(Box::pin(futures::StreamExt::chain(
                stream::iter(chunks),
                stream::pending::<Result<Bytes, ApiError>>(),
            )))),
            None => Ok(self.track(Box::pin(stream::pending::<Result<Bytes, ApiError>>()))),
        }
    }
}

/// Body stream that counts itself out of `live` when dropped.
struct TrackedStream {
    inner: ByteStream,
    live: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
    type Item = Result<Bytes, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Output capture
// =============================================================================

/// An `AsyncWrite` whose contents can be read after it has been moved away.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

pub fn connect_error() -> ApiError {
    ApiError::Connect("connection reset".to_string())
}
