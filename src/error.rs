//! Infrastructure error type.

use std::time::Duration;

use crate::config::ConfigError;

/// The error type returned by miniblog's fallible operations.
///
/// Client-facing failures are [`ApiError`](crate::ApiError) values turned into
/// responses. This type covers the process itself: loading configuration,
/// installing the logger, binding the socket, and shutting down.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener failed: {source}")]
    Accept {
        #[source]
        source: std::io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("logging: {0}")]
    Logging(String),

    #[error("server forced to shutdown after {deadline:?}: {remaining} connection(s) still open")]
    ShutdownTimeout { deadline: Duration, remaining: usize },

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
