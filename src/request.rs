//! Request identity: sources, decode parameters and the cache key.
//!
//! An [`ImageRequest`] pairs a source descriptor with decode parameters and
//! is value-equal: two requests with field-wise equal sources and parameters
//! collide on the same cache and queue slot. Equality covers every field
//! that affects the decoded output, including which remote URI or resource
//! bundle is referenced.

use crate::cache::Retention;
use std::path::PathBuf;

/// Where the image bytes come from.
///
/// Exactly one source per request; a request without a source is
/// unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// Image file in the local file system.
    File(PathBuf),
    /// Resource identifier within a named resource bundle.
    Bundled {
        /// Bundle name, resolved against the engine's bundle registry
        bundle: String,
        /// Resource identifier within the bundle
        id: String,
    },
    /// Remote URI, downloaded into the local cache before decoding.
    Remote(String),
}

/// Exact output dimensions requested for a full decode.
///
/// Width and height are always specified together; omitting both keeps the
/// natively decoded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

/// Decode parameters attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecodeParams {
    /// Sub-sample factor for the full decode (>= 1, 1 = no down-sampling)
    pub subsample: u32,
    /// Desired output dimensions, or `None` to keep the native size
    pub target: Option<TargetSize>,
    /// Whether dispatch may serve a cheap low-quality preview first
    pub preview: bool,
    /// Retention policy for the installed cache entry
    pub retention: Retention,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            subsample: 1,
            target: None,
            preview: true,
            retention: Retention::Collectible,
        }
    }
}

/// An image request: source descriptor plus decode parameters.
///
/// Requests are the key for the cache and both work queues. Equality and
/// hashing are structural over every field, so separate but equal request
/// values hit the same slot.
///
/// # Example
///
/// ```
/// use imgcache::request::{ImageRequest, TargetSize};
///
/// let req = ImageRequest::file("/tmp/a.png")
///     .with_target(TargetSize { width: 100, height: 50 })
///     .with_strong_retention();
/// assert_eq!(req, req.clone());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRequest {
    /// Image source descriptor
    pub source: ImageSource,
    /// Decode parameters
    pub params: DecodeParams,
}

impl ImageRequest {
    /// Create a request for an image file in the file system.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ImageSource::File(path.into()),
            params: DecodeParams::default(),
        }
    }

    /// Create a request for a bundled resource.
    ///
    /// # Arguments
    ///
    /// * `bundle` - Name of a bundle registered with the engine
    /// * `id` - Resource identifier within the bundle
    pub fn bundled(bundle: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: ImageSource::Bundled {
                bundle: bundle.into(),
                id: id.into(),
            },
            params: DecodeParams::default(),
        }
    }

    /// Create a request for a remote image addressed by URI.
    pub fn remote(uri: impl Into<String>) -> Self {
        Self {
            source: ImageSource::Remote(uri.into()),
            params: DecodeParams::default(),
        }
    }

    /// Set the sub-sample factor for the full decode (clamped to >= 1).
    pub fn with_subsample(mut self, subsample: u32) -> Self {
        self.params.subsample = subsample.max(1);
        self
    }

    /// Request exact output dimensions for the full decode.
    pub fn with_target(mut self, target: TargetSize) -> Self {
        self.params.target = Some(target);
        self
    }

    /// Enable or disable the inline low-quality preview.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.params.preview = preview;
        self
    }

    /// Hold the decoded buffer strongly (never reclaimed until evicted).
    pub fn with_strong_retention(mut self) -> Self {
        self.params.retention = Retention::Strong;
        self
    }

    /// The remote URI, if this request is URI-backed.
    pub fn remote_uri(&self) -> Option<&str> {
        match &self.source {
            ImageSource::Remote(uri) => Some(uri),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            ImageSource::File(path) => write!(f, "file:{}", path.display())?,
            ImageSource::Bundled { bundle, id } => write!(f, "bundle:{}/{}", bundle, id)?,
            ImageSource::Remote(uri) => write!(f, "uri:{}", uri)?,
        }
        write!(f, " subsample={}", self.params.subsample)?;
        if let Some(t) = self.params.target {
            write!(f, " target={}x{}", t.width, t.height)?;
        }
        write!(
            f,
            " preview={} retention={:?}",
            self.params.preview, self.params.retention
        )
    }
}
