//! Block-wise buffer transfer.
//!
//! A buffer is an ordered byte stream stored as numbered blocks under a
//! capability URI. Block `i` holds bytes `[i * block_size, (i + 1) * block_size)`
//! of the stream; the last data block may be shorter. One zero-length
//! terminal block follows the data blocks and marks the buffer complete, so
//! an empty stream is a single terminal block at index 0.
//!
//! [`BufferTransfer::write`] uploads a local stream with bounded parallelism
//! and [`BufferTransfer::read`] downloads one, holding out-of-order arrivals
//! until they can be written in index order.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use runstream::buffer::{resolve_access_string, BufferTransfer, HttpBlockTransport};
//! use runstream::config::TransferConfig;
//!
//! let config = TransferConfig::default();
//! let transport = Arc::new(HttpBlockTransport::new(config.block_timeout())?);
//! let transfer = BufferTransfer::new(transport, config);
//!
//! let uri = resolve_access_string("./input.uri")?;
//! let stats = transfer.write(&uri, tokio::io::stdin(), cancel).await?;
//! ```

mod error;
mod reader;
mod transport;
mod uri;
mod writer;

pub use error::{BlockFailure, BlockFailures, TransferError, TransferStats};
pub use transport::{BlockTransport, HttpBlockTransport, TransportError};
pub use uri::{resolve_access_string, AccessStringError, CapabilityUri, MAX_ACCESS_FILE_SIZE};

use std::sync::Arc;

use crate::config::TransferConfig;

/// Reads and writes buffers through a [`BlockTransport`].
#[derive(Debug)]
pub struct BufferTransfer<T> {
    transport: Arc<T>,
    config: TransferConfig,
}

impl<T> Clone for BufferTransfer<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config,
        }
    }
}

impl<T: BlockTransport> BufferTransfer<T> {
    pub fn new(transport: Arc<T>, config: TransferConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    fn block_size(&self) -> usize {
        self.config.block_size().max(1)
    }

    fn write_dop(&self) -> usize {
        self.config.write_dop().max(1)
    }

    fn read_dop(&self) -> u64 {
        self.config.read_dop().max(1) as u64
    }
}
