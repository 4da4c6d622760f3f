//! Resource bundles: named collections of embedded image resources.
//!
//! A bundled source addresses an image by `(bundle name, resource id)`
//! instead of a file path or URI. The trait allows different carriers
//! (in-memory assets, a directory on disk) to be used interchangeably and
//! makes tests independent of the file system.

use std::collections::HashMap;
use std::path::PathBuf;

/// A named collection of image resources addressed by identifier.
pub trait ResourceBundle: Send + Sync {
    /// Bundle name, used as the registry key and in request identity.
    fn name(&self) -> &str;

    /// Raw bytes for a resource, or `None` if the id is unknown.
    fn resource(&self, id: &str) -> Option<Vec<u8>>;
}

/// In-memory bundle mapping resource ids to byte blobs.
///
/// # Example
///
/// ```
/// use imgcache::bundle::{MemoryBundle, ResourceBundle};
///
/// let bundle = MemoryBundle::new("icons")
///     .with_resource("dot", vec![0u8; 4]);
/// assert!(bundle.resource("dot").is_some());
/// assert!(bundle.resource("missing").is_none());
/// ```
pub struct MemoryBundle {
    name: String,
    resources: HashMap<String, Vec<u8>>,
}

impl MemoryBundle {
    /// Create an empty bundle with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: HashMap::new(),
        }
    }

    /// Add a resource to the bundle.
    pub fn with_resource(mut self, id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.resources.insert(id.into(), bytes);
        self
    }
}

impl ResourceBundle for MemoryBundle {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource(&self, id: &str) -> Option<Vec<u8>> {
        self.resources.get(id).cloned()
    }
}

/// Bundle resolving resource ids as file names under a root directory.
pub struct DirBundle {
    name: String,
    root: PathBuf,
}

impl DirBundle {
    /// Create a bundle serving files under `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

impl ResourceBundle for DirBundle {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource(&self, id: &str) -> Option<Vec<u8>> {
        let path = self.root.join(id);
        if !path.is_file() {
            return None;
        }
        std::fs::read(path).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_bundle_lookup() {
        let bundle = MemoryBundle::new("icons").with_resource("a", vec![1, 2, 3]);
        assert_eq!(bundle.name(), "icons");
        assert_eq!(bundle.resource("a"), Some(vec![1, 2, 3]));
        assert_eq!(bundle.resource("b"), None);
    }

    #[test]
    fn test_dir_bundle_lookup() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.png"), b"bytes").unwrap();
        let bundle = DirBundle::new("assets", dir.path());
        assert_eq!(bundle.resource("a.png"), Some(b"bytes".to_vec()));
        assert_eq!(bundle.resource("missing.png"), None);
    }
}
