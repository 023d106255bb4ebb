//! Watch stream errors.

use thiserror::Error;

use crate::client::ApiError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatchError {
    /// The run does not exist. Never retried.
    #[error("run {0} not found")]
    RunNotFound(i64),

    /// A line of the stream was not a run snapshot. Never retried.
    #[error("invalid watch payload: {0}")]
    InvalidPayload(String),

    /// Opening or reading the stream failed.
    #[error("watch stream failed: {0}")]
    Stream(ApiError),

    /// The stream ended without delivering any event.
    #[error("watch stream ended without any events")]
    EndedEmpty,

    #[error("watch cancelled")]
    Cancelled,
}

impl WatchError {
    /// Whether resubscribing may help.
    pub fn is_transient(&self) -> bool {
        match self {
            WatchError::Stream(e) => e.is_transient(),
            WatchError::EndedEmpty => true,
            WatchError::RunNotFound(_) | WatchError::InvalidPayload(_) | WatchError::Cancelled => {
                false
            }
        }
    }

    pub(crate) fn from_api(run_id: i64, err: ApiError) -> Self {
        if err.is_not_found() {
            WatchError::RunNotFound(run_id)
        } else {
            WatchError::Stream(err)
        }
    }
}
