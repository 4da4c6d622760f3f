//! Engine configuration.

use std::path::PathBuf;

/// Default number of load worker threads.
pub const DEFAULT_LOAD_WORKERS: usize = 3;

/// Default number of download worker threads.
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 3;

/// Default allocation budget for a single decode (512 MiB).
pub const DEFAULT_DECODE_MEMORY_BUDGET: u64 = 512 * 1024 * 1024;

/// Default soft limit on estimated resident cache size (256 MiB).
pub const DEFAULT_MEMORY_SOFT_LIMIT: usize = 256 * 1024 * 1024;

/// Configuration for [`ImageEngine`](crate::engine::ImageEngine).
///
/// `Default` gives the production values; tests usually start from
/// [`EngineConfig::with_cache_dir`] on a scratch directory.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root cache directory; downloads land under `image_manager/` inside it
    pub cache_dir: PathBuf,
    /// Load worker pool size
    pub load_workers: usize,
    /// Download worker pool size
    pub download_workers: usize,
    /// Allocation budget per decode in bytes; breaching it is treated as
    /// out-of-memory and triggers global recovery
    pub decode_memory_budget: u64,
    /// Estimated resident size above which collectible entries are
    /// reclaimed; 0 disables the reclaim daemon
    pub memory_soft_limit: usize,
    /// How often the reclaim daemon checks the resident size
    pub reclaim_interval_secs: u64,
    /// Capacity of the recently-seen request list (diagnostics only)
    pub recent_capacity: usize,
    /// HTTP timeout for the default client
    pub http_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            load_workers: DEFAULT_LOAD_WORKERS,
            download_workers: DEFAULT_DOWNLOAD_WORKERS,
            decode_memory_budget: DEFAULT_DECODE_MEMORY_BUDGET,
            memory_soft_limit: DEFAULT_MEMORY_SOFT_LIMIT,
            reclaim_interval_secs: 10,
            recent_capacity: 128,
            http_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Default configuration with the given cache directory.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }
}
