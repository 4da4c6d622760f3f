//! The image engine: dispatch, worker pools and recovery.
//!
//! [`ImageEngine`] owns the cache, both work queues and the worker threads
//! that drain them. [`ImageEngine::get_image`] is the synchronous entry
//! point, called arbitrarily often (typically once per render tick): it
//! returns whatever is already available (nothing, a cheap preview, or the
//! full decode) and arranges for downloads and full decodes to happen off
//! the calling thread.
//!
//! The only caller-visible failure signal is absence: decode and download
//! errors are contained at the worker boundary, and a caller that keeps
//! polling will pick up the result once it lands in the cache.

use crate::buffer::DecodedImage;
use crate::bundle::ResourceBundle;
use crate::cache::{CacheEntry, Fidelity, ReclaimDaemon, ResourceCache};
use crate::config::EngineConfig;
use crate::decode::{self, DecodeError, PREVIEW_SUBSAMPLE};
use crate::diagnostics::EngineStatus;
use crate::download::{Downloader, DownloadError, HttpClient, ReqwestClient};
use crate::queue::WorkQueue;
use crate::request::{ImageRequest, ImageSource};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Engine construction failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Cache directory could not be created
    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),

    /// Default HTTP client could not be built
    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// State shared between dispatch and the worker threads.
struct EngineInner {
    config: EngineConfig,
    cache: Arc<ResourceCache>,
    load_queue: WorkQueue<ImageRequest>,
    download_queue: WorkQueue<String>,
    downloader: Downloader,
    bundles: HashMap<String, Arc<dyn ResourceBundle>>,
    /// Recently dispatched requests, most recent last. Diagnostics only.
    recent: Mutex<VecDeque<ImageRequest>>,
    started: Instant,
    /// Gates the per-request debug chatter on the dispatch path
    verbose: AtomicBool,
    /// Serializes recovery passes
    recovery_lock: Mutex<()>,
}

impl EngineInner {
    /// Whether a URI's bytes are locally available and not being fetched.
    fn is_downloaded(&self, uri: &str) -> bool {
        if self.download_queue.contains(&uri.to_string()) {
            return false;
        }
        self.downloader.is_materialized(uri)
    }

    /// Decode the request's source, preview or full.
    ///
    /// Preview decodes use the fixed aggressive factor; full decodes honor
    /// the request's sub-sample and, afterwards, its exact target size.
    fn decode_request(&self, req: &ImageRequest, preview: bool) -> Result<DecodedImage, DecodeError> {
        let factor = if preview {
            PREVIEW_SUBSAMPLE
        } else {
            req.params.subsample
        };
        let budget = self.config.decode_memory_budget;

        let mut image = match &req.source {
            ImageSource::File(path) => decode::decode_file(path, factor, budget)?,
            ImageSource::Bundled { bundle, id } => {
                let bytes = self
                    .bundles
                    .get(bundle)
                    .and_then(|b| b.resource(id))
                    .ok_or_else(|| DecodeError::NotFound(format!("bundle:{}/{}", bundle, id)))?;
                decode::decode_bytes(&bytes, factor, budget)?
            }
            ImageSource::Remote(uri) => {
                if !self.is_downloaded(uri) {
                    return Err(DecodeError::NotFound(format!("not downloaded: {}", uri)));
                }
                decode::decode_file(&self.downloader.local_path(uri), factor, budget)?
            }
        };

        if !preview {
            if let Some(target) = req.params.target {
                image = decode::rescale(image, target);
            }
        }

        Ok(DecodedImage::new(image))
    }

    /// Record a request in the bounded most-recently-used list.
    fn note_recent(&self, req: &ImageRequest) {
        let mut recent = self.recent.lock().unwrap();
        recent.retain(|seen| seen != req);
        recent.push_back(req.clone());
        while recent.len() > self.config.recent_capacity {
            recent.pop_front();
        }
    }

    fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            uptime: self.started.elapsed(),
            entries: self.cache.len(),
            estimated_bytes: self.cache.estimated_bytes(),
            load_queue_depth: self.load_queue.len(),
        }
    }

    /// Global recovery: evict everything and drain the pending load queue.
    ///
    /// Only one pass runs at a time. Downloaded files on disk and the
    /// download queue are never rolled back.
    fn clean_up(&self) {
        let _guard = self.recovery_lock.lock().unwrap();
        info!("image engine clean up");

        self.cache.clear();
        self.load_queue.clear();
        self.recent.lock().unwrap().clear();

        if self.verbose() {
            info!("{}", self.status());
        }
    }
}

/// Worker loop: drain the load queue, performing full decodes.
fn load_worker_loop(inner: Arc<EngineInner>) {
    debug!("image load worker started");

    while let Some(req) = inner.load_queue.take() {
        match inner.decode_request(&req, false) {
            Ok(image) => {
                if inner.verbose() && inner.cache.fidelity(&req) == Some(Fidelity::Preview) {
                    debug!(request = %req, "replacing preview with full image");
                }
                // Overwriting disposes a superseded preview buffer once the
                // last outstanding reference drops.
                inner.cache.put(
                    req.clone(),
                    CacheEntry::new(Arc::new(image), req.params.retention, Fidelity::Full),
                );
            }
            Err(DecodeError::OutOfMemory) => {
                warn!(request = %req, "out of memory while loading full image");
                inner.clean_up();
            }
            Err(err) => {
                // No entry installed; the key reverts to absent.
                debug!(request = %req, error = %err, "failed to load full image");
            }
        }
        inner.load_queue.complete(&req);
    }

    debug!("image load worker stopped");
}

/// Worker loop: drain the download queue, fetching URIs to local files.
fn download_worker_loop(inner: Arc<EngineInner>) {
    debug!("image download worker started");

    while let Some(uri) = inner.download_queue.take() {
        if let Err(err) = inner.downloader.download(&uri) {
            // Logged and dropped: the next access observes "still not
            // downloaded" and re-enqueues.
            warn!(uri = %uri, error = %err, "failed to download image");
        }
        inner.download_queue.complete(&uri);
    }

    debug!("image download worker stopped");
}

/// In-process asynchronous image cache and loader.
///
/// Constructed once at process initialization; shut down explicitly (or on
/// drop), which signals all workers to exit and joins them.
///
/// # Example
///
/// ```no_run
/// use imgcache::config::EngineConfig;
/// use imgcache::engine::ImageEngine;
/// use imgcache::request::ImageRequest;
///
/// let engine = ImageEngine::new(EngineConfig::default())?;
/// let request = ImageRequest::file("/tmp/photo.png");
///
/// // Poll until available; the first call may return a cheap preview.
/// if let Some(image) = engine.get_image(&request) {
///     println!("{}x{}", image.width(), image.height());
/// }
/// # Ok::<(), imgcache::engine::EngineError>(())
/// ```
pub struct ImageEngine {
    inner: Arc<EngineInner>,
    load_workers: Vec<JoinHandle<()>>,
    download_workers: Vec<JoinHandle<()>>,
    reclaim_daemon: Option<ReclaimDaemon>,
}

impl ImageEngine {
    /// Create an engine with the default HTTP client and no bundles.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let http = Arc::new(ReqwestClient::with_timeout(config.http_timeout_secs)?);
        Self::with_parts(config, http, Vec::new())
    }

    /// Create an engine with an injected HTTP client and resource bundles.
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration
    /// * `http` - HTTP client used by the download workers
    /// * `bundles` - Resource bundles, registered under their names
    pub fn with_parts(
        config: EngineConfig,
        http: Arc<dyn HttpClient>,
        bundles: Vec<Arc<dyn ResourceBundle>>,
    ) -> Result<Self, EngineError> {
        fs::create_dir_all(&config.cache_dir)?;

        let cache = Arc::new(ResourceCache::new());
        let bundles: HashMap<String, Arc<dyn ResourceBundle>> = bundles
            .into_iter()
            .map(|bundle| (bundle.name().to_string(), bundle))
            .collect();

        let inner = Arc::new(EngineInner {
            downloader: Downloader::new(http, config.cache_dir.clone()),
            cache: Arc::clone(&cache),
            load_queue: WorkQueue::new(),
            download_queue: WorkQueue::new(),
            bundles,
            recent: Mutex::new(VecDeque::new()),
            started: Instant::now(),
            verbose: AtomicBool::new(false),
            recovery_lock: Mutex::new(()),
            config,
        });

        let load_workers = (0..inner.config.load_workers)
            .map(|n| {
                let inner = Arc::clone(&inner);
                thread::Builder::new()
                    .name(format!("image-load-{}", n))
                    .spawn(move || load_worker_loop(inner))
                    .expect("Failed to spawn image load worker thread")
            })
            .collect();

        let download_workers = (0..inner.config.download_workers)
            .map(|n| {
                let inner = Arc::clone(&inner);
                thread::Builder::new()
                    .name(format!("image-download-{}", n))
                    .spawn(move || download_worker_loop(inner))
                    .expect("Failed to spawn image download worker thread")
            })
            .collect();

        let reclaim_daemon = if inner.config.memory_soft_limit > 0 {
            Some(ReclaimDaemon::start(
                cache,
                inner.config.memory_soft_limit,
                inner.config.reclaim_interval_secs,
            ))
        } else {
            None
        };

        info!(
            load_workers = inner.config.load_workers,
            download_workers = inner.config.download_workers,
            cache_dir = %inner.config.cache_dir.display(),
            "image engine started"
        );

        Ok(Self {
            inner,
            load_workers,
            download_workers,
            reclaim_daemon,
        })
    }

    /// Get the image for a request as currently available.
    ///
    /// Returns immediately with the cached buffer (preview or full), a
    /// freshly decoded inline preview, or `None` when nothing is available
    /// yet. Missing downloads and full decodes are queued as a side effect,
    /// so polling again later observes their results. `None` is
    /// indistinguishable from "still queued" by design.
    pub fn get_image(&self, req: &ImageRequest) -> Option<Arc<DecodedImage>> {
        let inner = &self.inner;
        inner.note_recent(req);

        if let Some(image) = inner.cache.get(req) {
            return Some(image);
        }

        // Remote sources must be materialized on disk before any decode.
        if let Some(uri) = req.remote_uri() {
            if !inner.is_downloaded(uri) {
                if inner.download_queue.enqueue(uri.to_string()) && inner.verbose() {
                    debug!(uri, "queued image download");
                }
                return None;
            }
        }

        let mut result = None;
        if req.params.preview {
            match inner.decode_request(req, true) {
                Ok(image) => {
                    // Install so concurrent callers observe the preview; a
                    // racing full decode is never clobbered.
                    result = Some(inner.cache.put_preview_if_absent(
                        req.clone(),
                        Arc::new(image),
                        req.params.retention,
                    ));
                }
                Err(DecodeError::OutOfMemory) => {
                    warn!(request = %req, "out of memory while loading preview image");
                    if inner.verbose() {
                        info!("{}", inner.status());
                    }
                }
                Err(err) => {
                    if inner.verbose() {
                        debug!(request = %req, error = %err, "failed to load preview image");
                    }
                }
            }
        }

        if inner.load_queue.enqueue(req.clone()) && inner.verbose() {
            debug!(request = %req, "queued image for full load");
        }

        result
    }

    /// Get the dimensions of a request's source without decoding pixels.
    ///
    /// Probes whichever source is locally available; returns `(0, 0)` when
    /// indeterminate. Never queues downloads or loads.
    pub fn get_image_size(&self, req: &ImageRequest) -> (u32, u32) {
        let inner = &self.inner;
        let dims = match &req.source {
            ImageSource::File(path) => decode::probe_file_size(path),
            ImageSource::Bundled { bundle, id } => inner
                .bundles
                .get(bundle)
                .and_then(|b| b.resource(id))
                .and_then(|bytes| decode::probe_bytes_size(&bytes)),
            ImageSource::Remote(uri) => {
                if inner.is_downloaded(uri) {
                    decode::probe_file_size(&inner.downloader.local_path(uri))
                } else {
                    None
                }
            }
        };
        dims.unwrap_or((0, 0))
    }

    /// Unload a request: drop its cache entry and pending load.
    ///
    /// A worker mid-decode for the key is not interrupted; its eventual
    /// install reintroduces the entry (benign resurrection).
    pub fn unload(&self, req: &ImageRequest) {
        let inner = &self.inner;
        inner.recent.lock().unwrap().retain(|seen| seen != req);
        inner.load_queue.remove(req);
        if inner.cache.remove(req).is_some() && inner.verbose() {
            debug!(request = %req, "image unloaded");
        }
    }

    /// Global recovery: evict every cache entry and drain the load queue.
    ///
    /// Runs automatically when a decode hits the memory budget; also
    /// callable as an administrative action. Downloaded files are never
    /// deleted.
    pub fn clean_up(&self) {
        self.inner.clean_up();
    }

    /// Evict every collectible cache entry, keeping strong ones.
    ///
    /// A manual memory-pressure pass; the reclaim daemon performs the same
    /// eviction automatically when the soft limit is exceeded.
    pub fn reclaim_collectible(&self) -> usize {
        self.inner.cache.reclaim_collectible()
    }

    /// Snapshot current engine state.
    pub fn status(&self) -> EngineStatus {
        self.inner.status()
    }

    /// Log the current engine status.
    pub fn log_status(&self) {
        info!("{}", self.inner.status());
    }

    /// Enable or disable the per-request debug logging.
    ///
    /// Dispatch runs once per render tick, so its chatter is off by
    /// default.
    pub fn set_logging_enabled(&self, enabled: bool) {
        self.inner.verbose.store(enabled, Ordering::Relaxed);
    }

    /// Whether per-request debug logging is enabled.
    pub fn is_logging_enabled(&self) -> bool {
        self.inner.verbose()
    }

    /// Keys currently held in the cache.
    pub fn cached_keys(&self) -> Vec<ImageRequest> {
        self.inner.cache.keys()
    }

    /// Whether a request is queued or in flight for a full load.
    pub fn is_loading(&self, req: &ImageRequest) -> bool {
        self.inner.load_queue.contains(req)
    }

    /// Shut the engine down: signal all workers and join them.
    pub fn shutdown(mut self) {
        self.shutdown_internal();
    }

    fn shutdown_internal(&mut self) {
        self.inner.load_queue.shutdown();
        self.inner.download_queue.shutdown();

        if let Some(mut daemon) = self.reclaim_daemon.take() {
            daemon.shutdown();
        }

        for handle in self
            .load_workers
            .drain(..)
            .chain(self.download_workers.drain(..))
        {
            if handle.join().is_err() {
                warn!("image engine worker thread panicked");
            }
        }
    }
}

impl Drop for ImageEngine {
    fn drop(&mut self) {
        self.shutdown_internal();
    }
}
