//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use runstream::buffer::{AccessStringError, TransferError};
use runstream::client::ApiError;
use runstream::config::ConfigFileError;
use runstream::exec::ExecError;
use runstream::logs::LogError;
use runstream::watch::WatchError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// A command-line value could not be used
    InvalidArgument(String),
    /// Failed to read a run definition file
    RunFile { path: String, error: std::io::Error },
    /// Control-plane request failed
    Api(ApiError),
    /// Buffer access string could not be resolved
    AccessString(AccessStringError),
    /// Buffer read or write failed
    Transfer(TransferError),
    /// Status watch failed
    Watch(WatchError),
    /// Log retrieval failed
    Logs(LogError),
    /// Run execution failed
    Exec(ExecError),
    /// Writing command output failed
    Output(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(_) | CliError::Api(ApiError::NotConfigured(_)) => {
                eprintln!();
                eprintln!("Set the service URI in one of:");
                eprintln!("  1. [server] uri in {}", runstream::config::config_file_path().display());
                eprintln!("  2. The {} environment variable", runstream::config::defaults::ENV_SERVER_URI);
            }
            CliError::Exec(ExecError::RunFailed { run_id, .. }) => {
                eprintln!();
                eprintln!("Inspect the run with: runstream run logs {}", run_id);
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "{}", msg),
            CliError::RunFile { path, error } => {
                write!(f, "Failed to read run file '{}': {}", path, error)
            }
            CliError::Api(e) => write!(f, "{}", e),
            CliError::AccessString(e) => write!(f, "{}", e),
            CliError::Transfer(e) => write!(f, "Buffer transfer failed: {}", e),
            CliError::Watch(e) => write!(f, "{}", e),
            CliError::Logs(e) => write!(f, "Failed to get logs: {}", e),
            CliError::Exec(e) => write!(f, "{}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::RunFile { error, .. } => Some(error),
            CliError::Api(e) => Some(e),
            CliError::AccessString(e) => Some(e),
            CliError::Transfer(e) => Some(e),
            CliError::Watch(e) => Some(e),
            CliError::Logs(e) => Some(e),
            CliError::Exec(e) => Some(e),
            CliError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ApiError> for CliError {
    fn from(e: ApiError) -> Self {
        CliError::Api(e)
    }
}

impl From<AccessStringError> for CliError {
    fn from(e: AccessStringError) -> Self {
        CliError::AccessString(e)
    }
}

impl From<TransferError> for CliError {
    fn from(e: TransferError) -> Self {
        CliError::Transfer(e)
    }
}

impl From<WatchError> for CliError {
    fn from(e: WatchError) -> Self {
        CliError::Watch(e)
    }
}

impl From<LogError> for CliError {
    fn from(e: LogError) -> Self {
        CliError::Logs(e)
    }
}

impl From<ExecError> for CliError {
    fn from(e: ExecError) -> Self {
        CliError::Exec(e)
    }
}
