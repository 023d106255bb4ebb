//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, client creation and
//! Ctrl-C handling so command handlers only deal with their own flow.

use std::path::Path;
use std::sync::Arc;

use runstream::buffer::HttpBlockTransport;
use runstream::client::{ApiError, HttpControlPlane};
use runstream::config::{ConfigFile, TransferConfig};
use runstream::logging::{init_logging, split_log_path, LoggingGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load the configuration and initialize logging.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file to use instead of `~/.runstream/config.ini`
    /// * `verbose` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!(version = runstream::VERSION, command, "runstream starting");
    }

    /// Control-plane client for the configured server.
    pub fn control_plane(&self) -> Result<Arc<HttpControlPlane>, CliError> {
        let uri = self.config.server.uri.as_deref().ok_or_else(|| {
            CliError::Api(ApiError::NotConfigured(
                "the server URI is not set".to_string(),
            ))
        })?;
        let client = HttpControlPlane::new(uri, self.config.server.token.clone())?;
        Ok(Arc::new(client))
    }

    /// Block transport for buffer data.
    pub fn block_transport(
        &self,
        transfer: &TransferConfig,
    ) -> Result<Arc<HttpBlockTransport>, CliError> {
        HttpBlockTransport::new(transfer.block_timeout())
            .map(Arc::new)
            .map_err(|e| CliError::Config(format!("failed to create block transport: {}", e)))
    }

    /// Token cancelled on the first Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                trigger.cancel();
            }
        });
        cancel
    }
}
