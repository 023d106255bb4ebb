//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing logic.

use std::path::PathBuf;
use std::time::Duration;

use super::transfer::TransferConfig;
use crate::exec::ExecConfig;
use crate::logs::FollowConfig;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Service endpoint and credentials
    pub server: ServerSettings,
    /// Buffer transfer tuning
    pub transfer: TransferSettings,
    /// Status watch behavior
    pub watch: WatchSettings,
    /// Log follow behavior
    pub logs: LogsSettings,
    /// Orchestrator behavior
    pub exec: ExecSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerSettings {
    /// Absolute URI of the job-execution service
    pub uri: Option<String>,
    /// Bearer token sent with every control-plane request
    pub token: Option<String>,
}

impl std::fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSettings")
            .field("uri", &self.uri)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Buffer transfer configuration.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Block size in bytes
    pub block_size: usize,
    /// Concurrent uploads per write
    pub write_dop: usize,
    /// Concurrent downloads per read
    pub read_dop: usize,
    /// Retries per block after a transient failure
    pub max_block_retries: u32,
    /// Poll interval for blocks not yet written
    pub block_poll_interval_ms: u64,
}

/// Status watch configuration.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Resubscriptions allowed after consecutive watch failures
    pub max_consecutive_errors: u32,
}

/// Log follow configuration.
#[derive(Debug, Clone)]
pub struct LogsSettings {
    /// Delay before reopening a dropped follow stream
    pub reconnect_delay_ms: u64,
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct ExecSettings {
    /// Time allowed for tasks to stop after a fatal condition
    pub shutdown_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Transfer configuration derived from the `[transfer]` section.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig::new()
            .with_block_size(self.transfer.block_size)
            .with_write_dop(self.transfer.write_dop)
            .with_read_dop(self.transfer.read_dop)
            .with_max_block_retries(self.transfer.max_block_retries)
            .with_block_poll_interval(Duration::from_millis(self.transfer.block_poll_interval_ms))
    }

    /// Log follow configuration derived from the `[logs]` section.
    pub fn follow_config(&self) -> FollowConfig {
        FollowConfig::default()
            .with_reconnect_delay(Duration::from_millis(self.logs.reconnect_delay_ms))
    }

    /// Orchestrator configuration derived from all sections.
    pub fn exec_config(&self) -> ExecConfig {
        ExecConfig::default()
            .with_transfer(self.transfer_config())
            .with_follow(self.follow_config())
            .with_watch_max_consecutive_errors(self.watch.max_consecutive_errors)
            .with_shutdown_timeout(Duration::from_secs(self.exec.shutdown_timeout_secs))
    }
}
