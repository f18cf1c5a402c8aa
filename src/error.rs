//! Error types shared by the backend adapter, tool clients, and configuration.

use std::path::PathBuf;

/// Errors raised while loading or applying configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from a single chat-completion round trip.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The provider answered with a 5xx status.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// The provider rejected the request (any other non-2xx status).
    #[error("request rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Server-side and transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Server { .. } | BackendError::Transport(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() {
            BackendError::Server {
                status: status.as_u16(),
                body,
            }
        } else {
            BackendError::Status {
                status: status.as_u16(),
                body,
            }
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err)
        }
    }
}

/// Errors from the remote execution service.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Unable to reach execution server at {0} after startup.")]
    Unreachable(String),

    #[error("Failed to launch execution server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("execution request failed: {0}")]
    Request(#[from] BackendError),
}
