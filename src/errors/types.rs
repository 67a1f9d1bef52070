//! Error type definitions for logo retrieval and caching

use thiserror::Error;

/// All error conditions that can occur while resolving a logo locator.
///
/// Uses `thiserror` for automatic trait implementations and error chaining.
/// These are internal conditions: the service normalizes every variant to a
/// `None` result plus a log entry, so callers never see them as exceptions.
#[derive(Error, Debug)]
pub enum LogoError {
    /// The origin answered with a non-success HTTP status
    #[error("Fetch failed: HTTP {status} from {url}")]
    Fetch { status: u16, url: String },

    /// Network-level failure: unreachable host, TLS error, interrupted body
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body is not a usable image
    #[error("Encoding failed for {url}: {reason}")]
    Encoding { url: String, reason: String },

    /// The locator is not a parseable URL
    #[error("Invalid locator: {0}")]
    InvalidLocator(#[from] url::ParseError),

    /// Configuration errors (invalid windows, unbuildable HTTP client)
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl LogoError {
    /// Create a fetch error from a response status
    pub fn fetch<S: Into<String>>(status: u16, url: S) -> Self {
        Self::Fetch {
            status,
            url: url.into(),
        }
    }

    /// Create an encoding error with a custom reason
    pub fn encoding<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::Encoding {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
