//! HTTP client seam for logo retrieval
//!
//! The [`LogoHttpClient`] trait isolates the transport so tests and callers
//! can substitute their own. [`StandardHttpClient`] is the reqwest-backed
//! default: connection timeout only (no total request timeout — a hung
//! transfer is the caller's latency problem, per the component contract),
//! a package-derived User-Agent, and a body size cap.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::errors::{LogoError, LogoResult};
use crate::utils::url::UrlUtils;

/// Raw fetch result: body bytes plus the origin's declared content type
/// (media type only, parameters stripped, lowercased).
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Transport abstraction for fetching logo bytes
#[async_trait]
pub trait LogoHttpClient: Send + Sync {
    /// Fetch the resource at `url` and return its body and content type.
    ///
    /// Non-success statuses are errors; redirects are followed by the
    /// underlying transport.
    async fn fetch_image(&self, url: &str) -> LogoResult<FetchedImage>;
}

/// Default implementation of LogoHttpClient using reqwest
pub struct StandardHttpClient {
    client: Client,
    max_body_bytes: u64,
}

impl StandardHttpClient {
    /// Create a new HTTP client with connection timeout, user agent and
    /// body size limit (0 = unlimited).
    pub fn new(
        connect_timeout: Duration,
        user_agent: &str,
        max_body_bytes: u64,
    ) -> LogoResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            max_body_bytes,
        })
    }
}

/// Extract the bare media type from a Content-Type header value
fn media_type(header_value: &str) -> String {
    header_value
        .split(';')
        .next()
        .unwrap_or(header_value)
        .trim()
        .to_ascii_lowercase()
}

#[async_trait]
impl LogoHttpClient for StandardHttpClient {
    async fn fetch_image(&self, url: &str) -> LogoResult<FetchedImage> {
        debug!(
            "Fetching logo from: {}",
            UrlUtils::obfuscate_credentials(url)
        );

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogoError::fetch(
                status.as_u16(),
                UrlUtils::obfuscate_credentials(url),
            ));
        }

        // Reject oversized bodies up front when the origin declares a length
        if self.max_body_bytes > 0
            && let Some(declared) = response.content_length()
            && declared > self.max_body_bytes
        {
            return Err(LogoError::encoding(
                UrlUtils::obfuscate_credentials(url),
                format!(
                    "declared body of {declared} bytes exceeds limit of {} bytes",
                    self.max_body_bytes
                ),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type);

        let bytes = response.bytes().await?;

        if self.max_body_bytes > 0 && bytes.len() as u64 > self.max_body_bytes {
            return Err(LogoError::encoding(
                UrlUtils::obfuscate_credentials(url),
                format!(
                    "body of {} bytes exceeds limit of {} bytes",
                    bytes.len(),
                    self.max_body_bytes
                ),
            ));
        }

        debug!("Fetched {} bytes of logo content", bytes.len());

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
