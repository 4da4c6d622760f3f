//! Downloading remote images into the local cache directory.
//!
//! Remote sources are fetched once into a deterministic local path derived
//! from a stable hash of the URI, and decoded from there like any other
//! file. Downloaded files are never deleted automatically.

mod http;

pub use http::{HttpClient, HttpResponse, ReqwestClient};

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Subdirectory of the cache directory holding downloaded images.
const DOWNLOAD_SUBDIR: &str = "image_manager";

/// Download failures.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// HTTP request could not be performed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Writing the downloaded body to disk failed
    #[error("download I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local path for a downloaded URI: `<cache_dir>/image_manager/<sha256(uri)>`.
pub fn local_path_for_uri(cache_dir: &Path, uri: &str) -> PathBuf {
    let digest = Sha256::digest(uri.as_bytes());
    cache_dir.join(DOWNLOAD_SUBDIR).join(format!("{:x}", digest))
}

/// Fetches remote URIs into the local cache directory.
pub struct Downloader {
    http: Arc<dyn HttpClient>,
    cache_dir: PathBuf,
}

impl Downloader {
    /// Create a downloader writing under `cache_dir`.
    pub fn new(http: Arc<dyn HttpClient>, cache_dir: PathBuf) -> Self {
        Self { http, cache_dir }
    }

    /// Local path this downloader uses for a URI.
    pub fn local_path(&self, uri: &str) -> PathBuf {
        local_path_for_uri(&self.cache_dir, uri)
    }

    /// Whether the URI's local file already exists as a regular file.
    ///
    /// Queue membership is checked separately by the engine; a URI being
    /// re-downloaded does not count as downloaded.
    pub fn is_materialized(&self, uri: &str) -> bool {
        let path = self.local_path(uri);
        path.exists() && path.is_file()
    }

    /// Fetch a URI and write its body to the local path.
    ///
    /// A non-2xx status is logged as a warning but the returned body is
    /// still written, mirroring the best-effort source semantics. Parent
    /// directories are created as needed.
    pub fn download(&self, uri: &str) -> Result<PathBuf, DownloadError> {
        debug!(uri, "downloading image");

        let response = self.http.get(uri)?;
        if !response.is_success() {
            warn!(uri, status = response.status, "non-success status while retrieving image");
        }

        let path = self.local_path(uri);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &response.body)?;

        debug!(uri, path = %path.display(), bytes = response.body.len(), "image downloaded");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Mock client replaying canned responses.
    pub struct MockHttpClient {
        responses: Mutex<Vec<Result<HttpResponse, DownloadError>>>,
    }

    impl MockHttpClient {
        fn with_response(status: u16, body: &[u8]) -> Self {
            Self {
                responses: Mutex::new(vec![Ok(HttpResponse {
                    status,
                    body: body.to_vec(),
                })]),
            }
        }

        fn failing() -> Self {
            Self {
                responses: Mutex::new(vec![Err(DownloadError::Http("connection refused".into()))]),
            }
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, _url: &str) -> Result<HttpResponse, DownloadError> {
            self.responses.lock().unwrap().pop().unwrap()
        }
    }

    #[test]
    fn test_local_path_is_stable() {
        let dir = Path::new("/cache");
        let a = local_path_for_uri(dir, "http://example.com/a.png");
        let b = local_path_for_uri(dir, "http://example.com/a.png");
        let c = local_path_for_uri(dir, "http://example.com/c.png");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("/cache/image_manager"));
    }

    #[test]
    fn test_download_writes_body() {
        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(
            Arc::new(MockHttpClient::with_response(200, b"pixels")),
            dir.path().to_path_buf(),
        );

        let uri = "http://example.com/a.png";
        assert!(!downloader.is_materialized(uri));
        let path = downloader.download(uri).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"pixels");
        assert!(downloader.is_materialized(uri));
    }

    #[test]
    fn test_non_success_body_still_written() {
        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(
            Arc::new(MockHttpClient::with_response(404, b"not found page")),
            dir.path().to_path_buf(),
        );

        let path = downloader.download("http://example.com/a.png").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"not found page");
    }

    #[test]
    fn test_transport_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let downloader =
            Downloader::new(Arc::new(MockHttpClient::failing()), dir.path().to_path_buf());

        let uri = "http://example.com/a.png";
        assert!(downloader.download(uri).is_err());
        assert!(!downloader.is_materialized(uri));
    }
}
