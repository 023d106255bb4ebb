use thiserror::Error;

use crate::buffer::{AccessStringError, TransferError};
use crate::client::ApiError;
use crate::model::RunStatus;
use crate::watch::WatchError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("a codespec for the job must be specified")]
    MissingCodespec,

    #[error("exec cannot be called if the job has multiple input buffers")]
    MultipleInputBuffers,

    #[error("exec cannot be called if the job has multiple output buffers")]
    MultipleOutputBuffers,

    #[error("the run has no buffer bound to parameter '{0}'")]
    UnboundBuffer(String),

    #[error("the service returned an invalid buffer access URI for '{parameter}': {source}")]
    InvalidAccessUri {
        parameter: String,
        #[source]
        source: AccessStringError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to watch run: {0}")]
    Watch(#[from] WatchError),

    #[error("run {run_id} failed with status {status}{}", .reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default())]
    RunFailed {
        run_id: i64,
        status: RunStatus,
        reason: Option<String>,
    },

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("run task panicked: {0}")]
    TaskPanicked(String),

    #[error("cancelled")]
    Cancelled,
}
