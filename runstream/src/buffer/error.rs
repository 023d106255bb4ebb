//! Transfer errors and statistics.

use std::fmt;

use thiserror::Error;

use super::transport::TransportError;

/// A block that could not be transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFailure {
    pub index: u64,
    pub error: TransportError,
}

/// Every block failure observed before the transfer stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockFailures(pub Vec<BlockFailure>);

impl BlockFailures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockFailure> {
        self.0.iter()
    }
}

impl fmt::Display for BlockFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} block(s) failed", self.0.len())?;
        for (i, failure) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}block {}: {}", sep, failure.index, failure.error)?;
        }
        Ok(())
    }
}

/// Errors that end a buffer read or write.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("error reading input: {0}")]
    Source(#[source] std::io::Error),

    #[error("error writing output: {0}")]
    Sink(#[source] std::io::Error),

    #[error("buffer transfer failed: {0}")]
    BlocksFailed(BlockFailures),

    #[error("block worker panicked: {0}")]
    Worker(String),

    #[error("buffer transfer cancelled")]
    Cancelled,
}

impl TransferError {
    pub(crate) fn single(index: u64, error: TransportError) -> Self {
        TransferError::BlocksFailed(BlockFailures(vec![BlockFailure { index, error }]))
    }
}

/// Counters reported when a transfer completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Data blocks moved, excluding the terminal block
    pub blocks: u64,
    /// Payload bytes moved
    pub bytes: u64,
}

impl TransferStats {
    pub(crate) fn record(&mut self, len: usize) {
        self.blocks += 1;
        self.bytes += len as u64;
    }
}
