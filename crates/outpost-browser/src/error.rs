//! Error types for the browser capability.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving the browser.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// No usable Chrome/Chromium binary was found, or it failed to start.
    #[error("failed to launch browser: {reason}")]
    Launch { reason: String },

    /// Failed to reach the DevTools HTTP or WebSocket endpoint.
    #[error("failed to connect to DevTools at {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// A DevTools command returned an error response.
    #[error("DevTools error {code}: {message}")]
    Cdp { code: i64, message: String },

    /// A DevTools command got no response in time.
    #[error("DevTools command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// Malformed frames, closed connections, serialization failures.
    #[error("DevTools protocol error: {detail}")]
    Protocol { detail: String },

    /// The requested element does not exist on the page.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// Navigation was rejected by the browser.
    #[error("navigation failed: {reason}")]
    NavigationFailed { reason: String },

    /// Evaluated JavaScript threw.
    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    /// The session has no open tab to operate on.
    #[error("no open tab")]
    NoTab,

    /// A DevTools HTTP endpoint call failed.
    #[error("DevTools HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
