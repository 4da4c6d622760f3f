//! Background daemon evicting collectible cache entries.
//!
//! The daemon runs in a separate thread and periodically checks whether the
//! cache's estimated resident size exceeds its soft limit, evicting
//! least-recently-accessed collectible entries until it fits. This is the
//! eviction trigger that stands in for a garbage collector's weak-reference
//! reclamation: strong entries are never touched.

use crate::cache::store::ResourceCache;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Background reclaim daemon for collectible cache entries.
///
/// Can be cleanly shut down by calling `shutdown()` or dropping the
/// `ReclaimDaemon` instance.
pub struct ReclaimDaemon {
    /// Handle to the daemon thread
    thread_handle: Option<JoinHandle<()>>,
    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl ReclaimDaemon {
    /// Start a new reclaim daemon.
    ///
    /// # Arguments
    ///
    /// * `cache` - Cache to watch
    /// * `soft_limit_bytes` - Resident size above which eviction runs
    /// * `interval_secs` - How often to check the resident size
    pub fn start(cache: Arc<ResourceCache>, soft_limit_bytes: usize, interval_secs: u64) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let thread_handle = thread::Builder::new()
            .name("cache-reclaim".to_string())
            .spawn(move || {
                Self::run_loop(cache, soft_limit_bytes, interval_secs, shutdown_clone);
            })
            .expect("Failed to spawn cache reclaim daemon thread");

        info!(
            soft_limit_bytes,
            interval_secs, "cache reclaim daemon started"
        );

        Self {
            thread_handle: Some(thread_handle),
            shutdown,
        }
    }

    /// The main daemon loop.
    fn run_loop(
        cache: Arc<ResourceCache>,
        soft_limit_bytes: usize,
        interval_secs: u64,
        shutdown: Arc<AtomicBool>,
    ) {
        let interval = Duration::from_secs(interval_secs.max(1));

        // Sleep in short steps so shutdown stays responsive.
        let step = Duration::from_millis(200);
        let mut elapsed = Duration::ZERO;

        loop {
            if shutdown.load(Ordering::Relaxed) {
                debug!("cache reclaim daemon received shutdown signal");
                break;
            }

            if elapsed >= interval {
                elapsed = Duration::ZERO;
                let resident = cache.estimated_bytes();
                if resident > soft_limit_bytes {
                    debug!(
                        resident_bytes = resident,
                        soft_limit_bytes, "resident size over soft limit, reclaiming"
                    );
                    cache.reclaim_to(soft_limit_bytes);
                }
            }

            thread::sleep(step);
            elapsed += step;
        }
    }

    /// Signal the daemon to stop and wait for its thread to exit.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("cache reclaim daemon thread panicked");
            }
        }
    }
}

impl Drop for ReclaimDaemon {
    fn drop(&mut self) {
        self.shutdown();
    }
}
