//! Error taxonomy for the lookup pipeline.
//! Resolver failures propagate to the façade; translation failures never do.

use std::time::Duration;

use thiserror::Error;

/// Failure talking to the search index.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("search index transport error: {0}")]
    Transport(String),
    #[error("search index returned HTTP {0}")]
    Status(u16),
    #[error("search index timeout")]
    Timeout,
    #[error("search index response could not be parsed: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ResolveError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResolveError::Timeout
        } else if e.is_decode() {
            ResolveError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            ResolveError::Status(status.as_u16())
        } else {
            ResolveError::Transport(e.to_string())
        }
    }
}

/// Failure of a single translation attempt.
#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    #[error("translation transport error: {0}")]
    Transport(String),
    #[error("translation provider rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("translation timeout")]
    Timeout,
    #[error("translation provider error: {0}")]
    Provider(String),
    #[error("translation provider returned no text")]
    EmptyResponse,
}

impl TranslateError {
    /// Explicit throttling signal from the provider.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, TranslateError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for TranslateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranslateError::Timeout
        } else {
            TranslateError::Transport(e.to_string())
        }
    }
}

/// Façade-level failure. Always surfaces as a 500-class response.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("glossary IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glossary parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure while bringing the server up or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("search client: {0}")]
    Index(#[from] ResolveError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
