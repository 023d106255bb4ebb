//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::file::config_directory;
use super::settings::*;

// =============================================================================
// Transfer
// =============================================================================

/// Default block size for buffer writes (4 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Default concurrent block uploads per write.
pub const DEFAULT_WRITE_DOP: usize = 16;

/// Default concurrent block downloads per read.
pub const DEFAULT_READ_DOP: usize = 32;

/// Default retries per block after a transient failure.
pub const DEFAULT_MAX_BLOCK_RETRIES: u32 = 5;

/// Base delay for exponential block retry backoff.
pub const DEFAULT_BLOCK_RETRY_BASE_DELAY_MS: u64 = 100;

/// Default wait between polls for a block that is not yet written.
pub const DEFAULT_BLOCK_POLL_INTERVAL_MS: u64 = 500;

/// Default timeout for one block request.
pub const DEFAULT_BLOCK_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Streams and orchestration
// =============================================================================

/// Consecutive watch failures tolerated before the watch is fatal.
/// One resubscription is attempted after the first failure.
pub const DEFAULT_WATCH_MAX_CONSECUTIVE_ERRORS: u32 = 1;

/// Default delay before reopening a dropped log follow stream.
pub const DEFAULT_LOG_RECONNECT_DELAY_MS: u64 = 250;

/// Default time allowed for tasks to stop after cancellation.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Environment overrides
// =============================================================================

/// Environment variable overriding `[server] uri`.
pub const ENV_SERVER_URI: &str = "RUNSTREAM_SERVER_URI";

/// Environment variable overriding `[server] token`.
pub const ENV_TOKEN: &str = "RUNSTREAM_TOKEN";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                uri: None,
                token: None,
            },
            transfer: TransferSettings {
                block_size: DEFAULT_BLOCK_SIZE,
                write_dop: DEFAULT_WRITE_DOP,
                read_dop: DEFAULT_READ_DOP,
                max_block_retries: DEFAULT_MAX_BLOCK_RETRIES,
                block_poll_interval_ms: DEFAULT_BLOCK_POLL_INTERVAL_MS,
            },
            watch: WatchSettings {
                max_consecutive_errors: DEFAULT_WATCH_MAX_CONSECUTIVE_ERRORS,
            },
            logs: LogsSettings {
                reconnect_delay_ms: DEFAULT_LOG_RECONNECT_DELAY_MS,
            },
            exec: ExecSettings {
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            logging: LoggingSettings {
                file: config_directory().join("runstream.log"),
            },
        }
    }
}
