//! Orchestrator configuration.

use std::time::Duration;

use crate::config::defaults::{DEFAULT_SHUTDOWN_TIMEOUT_SECS, DEFAULT_WATCH_MAX_CONSECUTIVE_ERRORS};
use crate::config::TransferConfig;
use crate::logs::FollowConfig;
use crate::retry::RetryPolicy;

/// Settings for [`Orchestrator::exec`](super::Orchestrator::exec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecConfig {
    transfer: TransferConfig,
    follow: FollowConfig,
    watch_max_consecutive_errors: u32,
    shutdown_timeout: Duration,
    log_timestamps: bool,
}

impl ExecConfig {
    pub fn with_transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn with_follow(mut self, follow: FollowConfig) -> Self {
        self.follow = follow;
        self
    }

    pub fn with_watch_max_consecutive_errors(mut self, max: u32) -> Self {
        self.watch_max_consecutive_errors = max;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Print log lines with their timestamp prefix.
    pub fn with_log_timestamps(mut self, timestamps: bool) -> Self {
        self.log_timestamps = timestamps;
        self
    }

    pub fn transfer(&self) -> &TransferConfig {
        &self.transfer
    }

    pub fn follow(&self) -> &FollowConfig {
        &self.follow
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn log_timestamps(&self) -> bool {
        self.log_timestamps
    }

    /// Immediate resubscription, bounded by the consecutive error limit.
    pub fn watch_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(self.watch_max_consecutive_errors)
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            transfer: TransferConfig::default(),
            follow: FollowConfig::default(),
            watch_max_consecutive_errors: DEFAULT_WATCH_MAX_CONSECUTIVE_ERRORS,
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            log_timestamps: false,
        }
    }
}
