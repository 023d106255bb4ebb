//! One subscription to `GET v1/runs/{id}?watch=true`.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::error::WatchError;
use crate::client::ControlPlane;
use crate::model::RunEvent;

/// Queue depth between the stream reader and its consumer.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Incremental newline-delimited JSON decoder.
///
/// Input arrives in arbitrary fragments; every complete line is decoded as
/// one [`RunEvent`]. Blank lines are skipped.
#[derive(Debug, Default)]
pub struct LineDecoder {
    partial: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a fragment and return the events completed by it.
    pub fn push(&mut self, fragment: &[u8]) -> Result<Vec<RunEvent>, WatchError> {
        let mut events = Vec::new();
        let mut rest = fragment;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.partial.extend_from_slice(&rest[..pos]);
            rest = &rest[pos + 1..];
            let line = std::mem::take(&mut self.partial);
            if let Some(event) = decode_line(&line)? {
                events.push(event);
            }
        }
        self.partial.extend_from_slice(rest);
        Ok(events)
    }

    /// Check the stream ended on a line boundary.
    pub fn finish(self) -> Result<(), WatchError> {
        if self.partial.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(WatchError::InvalidPayload(
                "stream ended in the middle of a line".to_string(),
            ))
        }
    }
}

fn decode_line(line: &[u8]) -> Result<Option<RunEvent>, WatchError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(line)
        .map(Some)
        .map_err(|e| WatchError::InvalidPayload(e.to_string()))
}

/// Open one watch subscription and deliver its events through a queue.
///
/// Events arrive in server order. A clean end of stream closes the queue;
/// any failure is delivered as the last item before it closes.
pub fn subscribe<C>(
    client: Arc<C>,
    run_id: i64,
    cancel: CancellationToken,
) -> mpsc::Receiver<Result<RunEvent, WatchError>>
where
    C: ControlPlane + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                trace!(run_id, "Watch subscription cancelled");
            }
            result = pump(client.as_ref(), run_id, &tx) => {
                if let Err(e) = result {
                    let _ = tx.send(Err(e)).await;
                }
            }
        }
    });

    rx
}

async fn pump<C: ControlPlane>(
    client: &C,
    run_id: i64,
    tx: &mpsc::Sender<Result<RunEvent, WatchError>>,
) -> Result<(), WatchError> {
    let path = format!("v1/runs/{}?watch=true", run_id);
    let mut body = client
        .open_stream(&path)
        .await
        .map_err(|e| WatchError::from_api(run_id, e))?;
    debug!(run_id, "Watch stream opened");

    let mut decoder = LineDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(WatchError::Stream)?;
        for event in decoder.push(&chunk)? {
            if tx.send(Ok(event)).await.is_err() {
                // Consumer went away.
                return Ok(());
            }
        }
    }

    decoder.finish()?;
    debug!(run_id, "Watch stream ended");
    Ok(())
}
