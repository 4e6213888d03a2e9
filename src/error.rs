use std::sync::Arc;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the flag client and the wrapper server lifecycle.
///
/// Per-request failures of the HTTP handlers are not represented here. They are translated into
/// HTTP responses at the handler boundary and never reach the operator.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The SDK key is empty.
    #[error("SDK key cannot be empty")]
    MissingSdkKey,

    /// `config_url` or `event_url` cannot be parsed.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The flag service rejected the SDK key.
    #[error("unauthorized, SDK key is likely invalid")]
    Unauthorized,

    /// The authentication token returned by the flag service cannot be decoded.
    #[error("invalid authentication token: {0}")]
    InvalidToken(String),

    /// The flag service answered with a status the client does not know how to handle.
    #[error("unexpected response status: {0}")]
    UnexpectedStatus(u16),

    /// Indicates that the poller thread panicked. This should normally never happen.
    #[error("poller thread panicked")]
    PollerThreadPanicked,

    /// `start()` was called on a server that has already been started.
    #[error("server has already been started")]
    AlreadyStarted,

    /// Wrapper configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A self test check against a running server failed.
    #[error("self test failed: {0}")]
    SelfTest(String),

    /// An I/O error.
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    #[error(transparent)]
    Io(Arc<std::io::Error>),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// Malformed JSON.
    #[error(transparent)]
    Json(Arc<serde_json::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(Arc::new(value))
    }
}
