//! Buffer download.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::error::{BlockFailure, BlockFailures, TransferError, TransferStats};
use super::transport::{BlockTransport, TransportError};
use super::uri::CapabilityUri;
use super::BufferTransfer;
use crate::retry::RetryPolicy;

type FetchResult = (u64, Result<Bytes, TransportError>);

impl<T: BlockTransport> BufferTransfer<T> {
    /// Download the buffer at `uri` into `sink`.
    ///
    /// Blocks are fetched with at most `read_dop` requests in flight and
    /// never more than `read_dop` indices ahead of the next block to write.
    /// Arrivals are held until every lower index has been written, so `sink`
    /// receives the buffer's bytes in order. The transfer ends at the terminal
    /// block, whose (empty) contents are not written.
    ///
    /// A block that does not exist yet is polled every `block_poll_interval`
    /// until it appears or `cancel` fires.
    pub async fn read<W>(
        &self,
        uri: &CapabilityUri,
        mut sink: W,
        cancel: CancellationToken,
    ) -> Result<TransferStats, TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        let dop = self.read_dop();
        let policy = self.config.block_retry_policy();
        let poll_interval = self.config.block_poll_interval();

        debug!(buffer = %uri, dop, "Starting buffer read");

        let mut fetches: JoinSet<FetchResult> = JoinSet::new();
        let mut holding: BTreeMap<u64, Bytes> = BTreeMap::new();
        let mut next_fetch: u64 = 0;
        let mut next_write: u64 = 0;
        let mut terminal: Option<u64> = None;
        let mut stats = TransferStats::default();

        loop {
            while terminal.is_none() && next_fetch < next_write + dop {
                self.spawn_fetch(&mut fetches, uri, next_fetch, policy, poll_interval, &cancel);
                next_fetch += 1;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(buffer = %uri, in_flight = fetches.len(), "Buffer read cancelled");
                    fetches.abort_all();
                    return Err(TransferError::Cancelled);
                }

                Some(joined) = fetches.join_next() => {
                    let (index, result) = match joined {
                        Ok(fetched) => fetched,
                        Err(e) if e.is_panic() => {
                            fetches.abort_all();
                            return Err(TransferError::Worker(e.to_string()));
                        }
                        Err(_) => continue,
                    };

                    match result {
                        Ok(data) if data.is_empty() => {
                            trace!(index, "Terminal block found");
                            terminal = Some(terminal.map_or(index, |t| t.min(index)));
                        }
                        Ok(data) => {
                            if terminal.map_or(true, |t| index < t) {
                                holding.insert(index, data);
                            }
                        }
                        Err(error) => {
                            warn!(index, error = %error, "Block download failed, aborting read");
                            fetches.abort_all();
                            return Err(collect_failures(BlockFailure { index, error }, &mut fetches).await);
                        }
                    }

                    while let Some(data) = holding.remove(&next_write) {
                        sink.write_all(&data).await.map_err(|e| {
                            fetches.abort_all();
                            TransferError::Sink(e)
                        })?;
                        stats.record(data.len());
                        next_write += 1;
                    }

                    if terminal == Some(next_write) {
                        // Anything still in flight is past the end of the buffer.
                        fetches.abort_all();
                        break;
                    }
                }
            }
        }

        sink.flush().await.map_err(TransferError::Sink)?;

        info!(
            buffer = %uri,
            blocks = stats.blocks,
            bytes = stats.bytes,
            "Buffer read complete"
        );
        Ok(stats)
    }

    fn spawn_fetch(
        &self,
        fetches: &mut JoinSet<FetchResult>,
        uri: &CapabilityUri,
        index: u64,
        policy: RetryPolicy,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) {
        let transport = Arc::clone(&self.transport);
        let uri = uri.clone();
        let token = cancel.child_token();

        fetches.spawn(async move {
            let result =
                get_with_retry(transport.as_ref(), &uri, index, policy, poll_interval, &token).await;
            (index, result)
        });
    }
}

async fn collect_failures(
    first: BlockFailure,
    fetches: &mut JoinSet<FetchResult>,
) -> TransferError {
    let mut failures = vec![first];
    while let Some(joined) = fetches.join_next().await {
        if let Ok((index, Err(error))) = joined {
            failures.push(BlockFailure { index, error });
        }
    }
    failures.sort_by_key(|f| f.index);
    TransferError::BlocksFailed(BlockFailures(failures))
}

/// One block download.
///
/// `NotFound` is polled without limit; transient failures are retried per
/// `policy`. Cancellation surfaces as a transient error that the caller
/// discards.
async fn get_with_retry<T: BlockTransport>(
    transport: &T,
    uri: &CapabilityUri,
    index: u64,
    policy: RetryPolicy,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<Bytes, TransportError> {
    let mut failures = 0u32;
    loop {
        let delay = match transport.get_block(uri, index).await {
            Ok(data) => return Ok(data),
            Err(TransportError::NotFound) => {
                trace!(index, "Block not written yet");
                failures = 0;
                poll_interval
            }
            Err(e) if e.is_transient() => {
                failures += 1;
                if !policy.should_retry(failures) {
                    return Err(e);
                }
                debug!(index, attempt = failures, error = %e, "Retrying block download");
                policy.delay_for(failures)
            }
            Err(e) => return Err(e),
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(TransportError::Transient("cancelled".to_string()));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
