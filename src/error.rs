//! Error types for render-api
//!
//! One `thiserror` enum per concern. Only [`RequestError`] and the
//! environment half of [`BrowserError`] ever reach a client directly; the
//! navigation errors are consumed by the retry loop, and a render that runs
//! out of attempts is reported through [`crate::render::RenderResult`].
//! [`Error`] covers the server process itself: its address and socket.

use thiserror::Error;

/// Errors that stop the server itself
#[derive(Error, Debug)]
pub enum Error {
    /// HOST/PORT do not form a socket address
    #[error("Invalid listen address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    /// Binding or serving failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Browser lifecycle and environment errors
///
/// Everything except [`BrowserError::CloseFailed`] is an environment failure:
/// it is reported immediately and never retried.
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// Failed to create the isolated browser context
    #[error("Failed to create browser context: {0}")]
    ContextCreationFailed(String),

    /// Failed to create new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Failed to install request interception
    #[error("Failed to install request interception: {0}")]
    InterceptionFailed(String),

    /// Failed to close the browser (logged, never surfaced)
    #[error("Failed to close browser: {0}")]
    CloseFailed(String),
}

/// Navigation errors raised inside a single attempt
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Navigation timeout
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),

    /// Selector did not appear in time
    #[error("Timed out after {timeout_ms}ms waiting for selector {selector:?}")]
    SelectorTimeout {
        /// Selector that was awaited
        selector: String,
        /// Bound that elapsed
        timeout_ms: u64,
    },

    /// Selector wait raised (e.g. malformed selector)
    #[error("Selector wait failed: {0}")]
    SelectorFailed(String),

    /// Network did not go quiet in time
    #[error("Network did not go quiet within {0}ms")]
    QuiescenceTimeout(u64),

    /// Document capture failed
    #[error("HTML capture failed: {0}")]
    CaptureFailed(String),
}

/// Render request validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// `url` missing or not an absolute http(s) URL
    #[error("Missing or invalid url param")]
    InvalidUrl(String),
}

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, Error>;
