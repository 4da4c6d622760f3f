//! HTTP client abstraction for testability.
//!
//! The trait enables dependency injection so tests can run against mock
//! clients instead of the network. Responses carry the status code alongside
//! the body because the downloader writes whatever body was returned even on
//! non-2xx statuses (best-effort source semantics).

use super::DownloadError;
use std::time::Duration;

/// An HTTP response: status code plus raw body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for blocking HTTP GET operations.
pub trait HttpClient: Send + Sync {
    /// Perform an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response status and body, or an error when the request could not
    /// be performed at all.
    fn get(&self, url: &str) -> Result<HttpResponse, DownloadError>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default 30 second timeout.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeout(30)
    }

    /// Creates a new ReqwestClient with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DownloadError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DownloadError::Http(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| DownloadError::Http(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}
