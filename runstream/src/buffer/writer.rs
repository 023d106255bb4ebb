//! Buffer upload.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{BlockFailure, BlockFailures, TransferError, TransferStats};
use super::transport::{BlockTransport, TransportError};
use super::uri::CapabilityUri;
use super::BufferTransfer;
use crate::retry::RetryPolicy;

type UploadResult = (u64, usize, Result<(), TransportError>);

impl<T: BlockTransport> BufferTransfer<T> {
    /// Upload `source` to the buffer at `uri`.
    ///
    /// The source is read to exhaustion and cut into blocks of the configured
    /// block size. At most `write_dop` uploads are in flight; each new upload
    /// takes the next unsent index. Once every data block has been stored the
    /// terminal block is uploaded at the following index.
    ///
    /// Transient block failures are retried per block. Any other failure
    /// aborts the remaining uploads and is returned together with every other
    /// failure already observed.
    pub async fn write<R>(
        &self,
        uri: &CapabilityUri,
        mut source: R,
        cancel: CancellationToken,
    ) -> Result<TransferStats, TransferError>
    where
        R: AsyncRead + Unpin,
    {
        let block_size = self.block_size();
        let dop = self.write_dop();
        let policy = self.config.block_retry_policy();

        debug!(buffer = %uri, block_size, dop, "Starting buffer write");

        let mut uploads: JoinSet<UploadResult> = JoinSet::new();
        let mut pending = BytesMut::with_capacity(block_size);
        let mut next_index: u64 = 0;
        let mut eof = false;
        let mut stats = TransferStats::default();

        loop {
            // Hand out full blocks, or the short final block once the source is drained.
            while uploads.len() < dop
                && (pending.len() >= block_size || (eof && !pending.is_empty()))
            {
                let len = pending.len().min(block_size);
                let data = pending.split_to(len).freeze();
                self.spawn_upload(&mut uploads, uri, next_index, data, policy, &cancel);
                next_index += 1;
            }

            if eof && pending.is_empty() && uploads.is_empty() {
                break;
            }

            let can_read = !eof && pending.len() < block_size;

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(buffer = %uri, in_flight = uploads.len(), "Buffer write cancelled");
                    uploads.abort_all();
                    return Err(TransferError::Cancelled);
                }

                Some(joined) = uploads.join_next(), if !uploads.is_empty() => {
                    handle_upload(joined, &mut uploads, &mut stats).await?;
                }

                read = source.read_buf(&mut pending), if can_read => {
                    match read {
                        Ok(0) => eof = true,
                        Ok(_) => {}
                        Err(e) => {
                            uploads.abort_all();
                            return Err(TransferError::Source(e));
                        }
                    }
                }
            }
        }

        // Every data block is stored; the terminal block marks the buffer complete.
        let terminal = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = put_with_retry(self.transport.as_ref(), uri, next_index, Bytes::new(), policy) => result,
        };
        terminal.map_err(|e| TransferError::single(next_index, e))?;

        info!(
            buffer = %uri,
            blocks = stats.blocks,
            bytes = stats.bytes,
            "Buffer write complete"
        );
        Ok(stats)
    }

    fn spawn_upload(
        &self,
        uploads: &mut JoinSet<UploadResult>,
        uri: &CapabilityUri,
        index: u64,
        data: Bytes,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) {
        let transport = Arc::clone(&self.transport);
        let uri = uri.clone();
        let token = cancel.child_token();
        let len = data.len();

        uploads.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(TransportError::Transient("cancelled".to_string())),
                result = put_with_retry(transport.as_ref(), &uri, index, data, policy) => result,
            };
            (index, len, result)
        });
    }
}

/// Record one finished upload. On failure, stop the rest and gather every
/// failure that has already completed.
async fn handle_upload(
    joined: Result<UploadResult, JoinError>,
    uploads: &mut JoinSet<UploadResult>,
    stats: &mut TransferStats,
) -> Result<(), TransferError> {
    let first = match joined {
        Ok((_, len, Ok(()))) => {
            stats.record(len);
            return Ok(());
        }
        Ok((index, _, Err(error))) => BlockFailure { index, error },
        Err(e) if e.is_panic() => return Err(TransferError::Worker(e.to_string())),
        Err(_) => return Ok(()),
    };

    warn!(index = first.index, error = %first.error, "Block upload failed, aborting write");
    uploads.abort_all();

    let mut failures = vec![first];
    while let Some(joined) = uploads.join_next().await {
        if let Ok((index, _, Err(error))) = joined {
            failures.push(BlockFailure { index, error });
        }
    }
    failures.sort_by_key(|f| f.index);
    Err(TransferError::BlocksFailed(BlockFailures(failures)))
}

/// One block upload with per-block retry of transient failures.
///
/// `NotFound` on upload means the container is gone and is not retried.
pub(super) async fn put_with_retry<T: BlockTransport>(
    transport: &T,
    uri: &CapabilityUri,
    index: u64,
    data: Bytes,
    policy: RetryPolicy,
) -> Result<(), TransportError> {
    let mut failures = 0u32;
    loop {
        match transport.put_block(uri, index, data.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() => {
                failures += 1;
                if !policy.should_retry(failures) {
                    return Err(e);
                }
                let delay = policy.delay_for(failures);
                debug!(index, attempt = failures, delay_ms = delay.as_millis() as u64, error = %e, "Retrying block upload");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
