//! Error types for control-plane requests.

use thiserror::Error;

/// Errors that can occur when talking to the job-execution service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// No server URI configured, or it is not an absolute URI.
    #[error("no server configured: {0}")]
    NotConfigured(String),

    /// The request could not be sent or the connection failed.
    #[error("unable to connect to server: {0}")]
    Connect(String),

    /// The service answered with a non-success status code.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    /// The response body could not be understood.
    #[error("unable to understand server response: {0}")]
    Decode(String),

    /// Reading a streamed response body failed part-way.
    #[error("response stream interrupted: {0}")]
    Stream(String),
}

impl ApiError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Connect(_) | ApiError::Stream(_) => true,
            ApiError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ApiError::NotConfigured(_) | ApiError::Decode(_) => false,
        }
    }

    /// Whether the service reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ApiError::Connect("reset".into()).is_transient());
        assert!(ApiError::Stream("eof".into()).is_transient());
        assert!(ApiError::Status {
            status: 503,
            message: "busy".into()
        }
        .is_transient());
        assert!(!ApiError::Status {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
        assert!(ApiError::Status {
            status: 404,
            message: "gone".into()
        }
        .is_not_found());
        assert!(!ApiError::Decode("x".into()).is_transient());
    }
}
