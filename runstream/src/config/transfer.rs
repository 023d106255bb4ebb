//! Buffer transfer configuration.

use std::time::Duration;

use super::defaults::{
    DEFAULT_BLOCK_POLL_INTERVAL_MS, DEFAULT_BLOCK_RETRY_BASE_DELAY_MS, DEFAULT_BLOCK_SIZE,
    DEFAULT_BLOCK_TIMEOUT_SECS, DEFAULT_MAX_BLOCK_RETRIES, DEFAULT_READ_DOP, DEFAULT_WRITE_DOP,
};
use crate::retry::RetryPolicy;

/// Configuration for block-wise buffer reads and writes.
///
/// # Example
///
/// ```
/// use runstream::config::TransferConfig;
///
/// let config = TransferConfig::default();
/// assert_eq!(config.block_size(), 4 * 1024 * 1024);
///
/// let config = TransferConfig::new()
///     .with_block_size(1024 * 1024)
///     .with_write_dop(4)
///     .with_read_dop(8);
/// assert_eq!(config.write_dop(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Size of each uploaded block in bytes (the last block may be shorter)
    block_size: usize,
    /// Concurrent block uploads per write
    write_dop: usize,
    /// Concurrent block downloads per read
    read_dop: usize,
    /// Retries per block after a transient failure
    max_block_retries: u32,
    /// Wait between polls for a block that has not been written yet
    block_poll_interval: Duration,
    /// Timeout for one block request
    block_timeout: Duration,
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_write_dop(mut self, dop: usize) -> Self {
        self.write_dop = dop;
        self
    }

    pub fn with_read_dop(mut self, dop: usize) -> Self {
        self.read_dop = dop;
        self
    }

    pub fn with_max_block_retries(mut self, retries: u32) -> Self {
        self.max_block_retries = retries;
        self
    }

    pub fn with_block_poll_interval(mut self, interval: Duration) -> Self {
        self.block_poll_interval = interval;
        self
    }

    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn write_dop(&self) -> usize {
        self.write_dop
    }

    pub fn read_dop(&self) -> usize {
        self.read_dop
    }

    pub fn max_block_retries(&self) -> u32 {
        self.max_block_retries
    }

    pub fn block_poll_interval(&self) -> Duration {
        self.block_poll_interval
    }

    pub fn block_timeout(&self) -> Duration {
        self.block_timeout
    }

    /// Retry policy applied to each block after a transient failure.
    pub fn block_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(self.max_block_retries)
            .with_exponential_backoff(Duration::from_millis(DEFAULT_BLOCK_RETRY_BASE_DELAY_MS))
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            write_dop: DEFAULT_WRITE_DOP,
            read_dop: DEFAULT_READ_DOP,
            max_block_retries: DEFAULT_MAX_BLOCK_RETRIES,
            block_poll_interval: Duration::from_millis(DEFAULT_BLOCK_POLL_INTERVAL_MS),
            block_timeout: Duration::from_secs(DEFAULT_BLOCK_TIMEOUT_SECS),
        }
    }
}
