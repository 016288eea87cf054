//! Error surface for page interactions.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SurfaceError {
    /// Navigation did not reach the requested readiness state in time.
    #[error("navigation timeout: {0}")]
    NavTimeout(String),

    /// A bounded wait expired before its predicate held.
    #[error("wait timeout: {0}")]
    WaitTimeout(String),

    /// Selector matched nothing when an element was required.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Browser transport or protocol failure.
    #[error("browser i/o error: {0}")]
    BrowserIo(String),

    /// Script evaluation failed or returned an unusable value.
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    /// Malformed URL handed to navigation.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Session launch or teardown failure.
    #[error("session error: {0}")]
    Session(String),
}

impl SurfaceError {
    /// Whole-operation retry makes sense for transport-ish failures only.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SurfaceError::NavTimeout(_) | SurfaceError::WaitTimeout(_) | SurfaceError::BrowserIo(_)
        )
    }
}
