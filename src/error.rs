//! Startup error type.
//!
//! Per-request failures (401, 404, breaker rejections, backend faults) are
//! expressed as HTTP [`Response`](crate::Response) values inside the router
//! and never surface here. This type covers the faults that legitimately
//! abort the process: a bad configuration file or failing to bind the
//! listening port.

use thiserror::Error;

/// The error type returned by torii's fallible startup operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yml::Error),

    #[error("invalid listen address `{0}`")]
    Listen(String),

    #[error("invalid signing secret: {0}")]
    Secret(#[from] base64::DecodeError),

    #[error("invalid route pattern `{pattern}`: {source}")]
    Route {
        pattern: String,
        source: matchit::InsertError,
    },
}
