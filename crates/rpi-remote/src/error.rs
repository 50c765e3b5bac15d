//! Error types for rpi-remote.

use axum::http::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for dispatcher and operation code.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that escape an operation and reach the dispatcher's failure boundary.
///
/// The `Display` text is what the client sees in the `error` field.
#[derive(Debug, Error)]
pub enum AgentError {
    /// `Content-Length` header was present but not a non-negative integer.
    #[error("invalid Content-Length: {0:?}")]
    ContentLength(String),

    /// The request body could not be read from the connection.
    #[error("failed to read request body: {0}")]
    ReadBody(#[source] axum::Error),

    /// Request body was not valid JSON.
    #[error("malformed request body: {0}")]
    Body(#[source] serde_json::Error),

    /// Request body was valid JSON but not an object.
    #[error("request body must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// A parameter was present with the wrong type.
    #[error("invalid parameters: {0}")]
    Params(#[source] serde_json::Error),

    /// The shell could not be launched.
    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting on the child or collecting its output failed.
    #[error("failed to wait for command: {0}")]
    Wait(#[source] std::io::Error),

    /// The command exceeded its wall-clock budget and was killed.
    #[error("Command '{cmd}' timed out after {} seconds", .timeout.as_secs())]
    Timeout {
        /// Command line as received.
        cmd: String,
        /// Budget that was exceeded.
        timeout: Duration,
    },

    /// Filesystem operation failed.
    #[error("{source}: '{}'", .path.display())]
    Io {
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The authorization hook rejected the request.
    #[error("Unauthorized")]
    Unauthorized,

    /// The operation result could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl AgentError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status the dispatcher answers with for this error.
    ///
    /// Everything except a rejected authorization collapses to 500, which is
    /// what existing clients expect.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = AgentError::Timeout {
            cmd: "sleep 400".to_string(),
            timeout: Duration::from_secs(300),
        };
        assert_eq!(
            err.to_string(),
            "Command 'sleep 400' timed out after 300 seconds"
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_io_message_includes_path() {
        let err = AgentError::io(
            "/no/such/dir/file.txt",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().ends_with("'/no/such/dir/file.txt'"));
    }

    #[test]
    fn test_unauthorized_status() {
        assert_eq!(AgentError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
