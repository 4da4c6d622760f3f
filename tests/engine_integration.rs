//! Integration tests for the image engine.
//!
//! These tests verify the complete dispatch workflow including:
//! - Preview-then-full loading
//! - Value-equal requests hitting the same cache slot
//! - Load deduplication (at most one in-flight full decode per key)
//! - Remote download flow through a mock HTTP client
//! - Retention policies under a simulated memory-pressure pass
//! - Global recovery and shutdown

use imgcache::bundle::MemoryBundle;
use imgcache::config::EngineConfig;
use imgcache::decode::PREVIEW_SUBSAMPLE;
use imgcache::download::{DownloadError, HttpClient, HttpResponse};
use imgcache::engine::ImageEngine;
use imgcache::request::{ImageRequest, TargetSize};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Encode a solid-color PNG of the given size.
fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([128, 64, 32, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, png_bytes(width, height)).unwrap();
    path
}

/// HTTP client serving a fixed body for every URL.
struct FixedHttpClient {
    status: u16,
    body: Vec<u8>,
}

impl HttpClient for FixedHttpClient {
    fn get(&self, _url: &str) -> Result<HttpResponse, DownloadError> {
        Ok(HttpResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

fn test_engine(dir: &TempDir) -> ImageEngine {
    let config = EngineConfig::with_cache_dir(dir.path().join("cache"));
    ImageEngine::with_parts(
        config,
        Arc::new(FixedHttpClient {
            status: 200,
            body: png_bytes(64, 64),
        }),
        vec![Arc::new(
            MemoryBundle::new("icons").with_resource("logo", png_bytes(24, 24)),
        )],
    )
    .unwrap()
}

/// Poll `get_image` until the predicate holds or the timeout elapses.
fn wait_for<F>(engine: &ImageEngine, req: &ImageRequest, predicate: F) -> bool
where
    F: Fn(&ImageEngine, &ImageRequest) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate(engine, req) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_preview_then_full() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    write_png(&dir, "a.png", 64, 64);
    let req = ImageRequest::file(dir.path().join("a.png"));

    // Cold key with preview enabled: the first call yields a synchronous
    // low-resolution result, down-sampled by at least the preview factor.
    let preview = engine.get_image(&req).expect("preview should be available");
    assert!(preview.width() <= 64 / PREVIEW_SUBSAMPLE);
    assert!(preview.height() <= 64 / PREVIEW_SUBSAMPLE);

    // The background worker replaces the preview with the full decode.
    let became_full = wait_for(&engine, &req, |engine, req| {
        engine
            .get_image(req)
            .is_some_and(|img| img.width() == 64 && img.height() == 64)
    });
    assert!(became_full, "full decode never replaced the preview");
}

#[test]
fn test_preview_disabled_returns_none_then_full() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    write_png(&dir, "a.png", 32, 16);
    let req = ImageRequest::file(dir.path().join("a.png")).with_preview(false);

    assert!(engine.get_image(&req).is_none());

    let loaded = wait_for(&engine, &req, |engine, req| {
        engine
            .get_image(req)
            .is_some_and(|img| (img.width(), img.height()) == (32, 16))
    });
    assert!(loaded);
}

#[test]
fn test_exact_target_dimensions() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    write_png(&dir, "a.png", 64, 64);
    let req = ImageRequest::file(dir.path().join("a.png"))
        .with_preview(false)
        .with_target(TargetSize {
            width: 100,
            height: 50,
        });

    engine.get_image(&req);
    let resized = wait_for(&engine, &req, |engine, req| {
        engine
            .get_image(req)
            .is_some_and(|img| (img.width(), img.height()) == (100, 50))
    });
    assert!(resized, "full decode was not rescaled to 100x50");
}

#[test]
fn test_subsample_halves_dimensions() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    write_png(&dir, "a.png", 64, 32);
    let req = ImageRequest::file(dir.path().join("a.png"))
        .with_preview(false)
        .with_subsample(2);

    engine.get_image(&req);
    let loaded = wait_for(&engine, &req, |engine, req| {
        engine
            .get_image(req)
            .is_some_and(|img| (img.width(), img.height()) == (32, 16))
    });
    assert!(loaded);
}

#[test]
fn test_equal_requests_share_cache_slot() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    write_png(&dir, "a.png", 48, 48);

    let first = ImageRequest::file(dir.path().join("a.png")).with_preview(false);
    engine.get_image(&first);
    assert!(wait_for(&engine, &first, |engine, req| {
        engine.get_image(req).is_some()
    }));

    // A separate but field-wise equal request value hits the same slot.
    let second = ImageRequest::file(dir.path().join("a.png")).with_preview(false);
    let a = engine.get_image(&first).unwrap();
    let b = engine.get_image(&second).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(engine.cached_keys().len(), 1);
}

#[test]
fn test_load_enqueue_is_idempotent() {
    let dir = TempDir::new().unwrap();
    // No workers: queued requests stay pending so we can observe the queue.
    let mut config = EngineConfig::with_cache_dir(dir.path().join("cache"));
    config.load_workers = 0;
    config.download_workers = 0;
    let engine = ImageEngine::with_parts(
        config,
        Arc::new(FixedHttpClient {
            status: 200,
            body: vec![],
        }),
        Vec::new(),
    )
    .unwrap();

    write_png(&dir, "a.png", 32, 32);
    let req = ImageRequest::file(dir.path().join("a.png")).with_preview(false);

    engine.get_image(&req);
    engine.get_image(&req);
    assert!(engine.is_loading(&req));
    assert_eq!(engine.status().load_queue_depth, 1);
}

#[test]
fn test_remote_download_flow() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let req = ImageRequest::remote("http://example.com/remote.png").with_preview(false);

    // Not yet downloaded: dispatch queues the download and returns nothing
    // without touching the load queue.
    assert!(engine.get_image(&req).is_none());
    assert!(!engine.is_loading(&req));

    // After the mock download materializes the file, polling yields the
    // decoded 64x64 image.
    let loaded = wait_for(&engine, &req, |engine, req| {
        engine
            .get_image(req)
            .is_some_and(|img| (img.width(), img.height()) == (64, 64))
    });
    assert!(loaded, "remote image never became available");
}

#[test]
fn test_bundled_resource_flow() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let req = ImageRequest::bundled("icons", "logo").with_preview(false);

    engine.get_image(&req);
    let loaded = wait_for(&engine, &req, |engine, req| {
        engine
            .get_image(req)
            .is_some_and(|img| (img.width(), img.height()) == (24, 24))
    });
    assert!(loaded);

    // Unknown bundle ids install nothing.
    let missing = ImageRequest::bundled("icons", "missing").with_preview(false);
    assert!(engine.get_image(&missing).is_none());
    assert_eq!(engine.get_image_size(&missing), (0, 0));
}

#[test]
fn test_get_image_size() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    write_png(&dir, "a.png", 33, 7);

    let req = ImageRequest::file(dir.path().join("a.png"));
    assert_eq!(engine.get_image_size(&req), (33, 7));

    // Bounds probing never queues work.
    assert!(!engine.is_loading(&req));
    assert!(engine.cached_keys().is_empty());

    // Undownloaded remote sources are indeterminate.
    let remote = ImageRequest::remote("http://example.com/unseen.png");
    assert_eq!(engine.get_image_size(&remote), (0, 0));

    let bundled = ImageRequest::bundled("icons", "logo");
    assert_eq!(engine.get_image_size(&bundled), (24, 24));
}

#[test]
fn test_strong_entries_survive_memory_pressure() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    write_png(&dir, "strong.png", 16, 16);
    write_png(&dir, "weak.png", 16, 16);

    let strong = ImageRequest::file(dir.path().join("strong.png"))
        .with_preview(false)
        .with_strong_retention();
    let weak = ImageRequest::file(dir.path().join("weak.png")).with_preview(false);

    engine.get_image(&strong);
    engine.get_image(&weak);
    assert!(wait_for(&engine, &strong, |e, r| e.get_image(r).is_some()));
    assert!(wait_for(&engine, &weak, |e, r| e.get_image(r).is_some()));

    engine.reclaim_collectible();

    // Strong entries never disappear spuriously; collectible ones may.
    assert!(engine.get_image(&strong).is_some());
    assert!(!engine.cached_keys().contains(&weak));
}

#[test]
fn test_unload_removes_entry_and_pending_load() {
    let dir = TempDir::new().unwrap();
    // No workers, so the pending load cannot race the unload.
    let mut config = EngineConfig::with_cache_dir(dir.path().join("cache"));
    config.load_workers = 0;
    config.download_workers = 0;
    let engine = ImageEngine::with_parts(
        config,
        Arc::new(FixedHttpClient {
            status: 200,
            body: vec![],
        }),
        Vec::new(),
    )
    .unwrap();

    write_png(&dir, "a.png", 32, 32);
    let req = ImageRequest::file(dir.path().join("a.png"));

    engine.get_image(&req);
    assert!(engine.is_loading(&req));

    engine.unload(&req);
    assert!(engine.cached_keys().is_empty());
    assert!(!engine.is_loading(&req));
    assert_eq!(engine.status().load_queue_depth, 0);
}

#[test]
fn test_clean_up_empties_cache_and_queue() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::with_cache_dir(dir.path().join("cache"));
    config.load_workers = 0;
    config.download_workers = 0;
    let engine = ImageEngine::with_parts(
        config,
        Arc::new(FixedHttpClient {
            status: 200,
            body: vec![],
        }),
        Vec::new(),
    )
    .unwrap();

    write_png(&dir, "a.png", 32, 32);
    write_png(&dir, "b.png", 32, 32);
    engine.get_image(&ImageRequest::file(dir.path().join("a.png")));
    engine.get_image(&ImageRequest::file(dir.path().join("b.png")));
    assert!(engine.status().entries > 0);
    assert!(engine.status().load_queue_depth > 0);

    engine.clean_up();

    let status = engine.status();
    assert!(engine.cached_keys().is_empty());
    assert_eq!(status.entries, 0);
    assert_eq!(status.load_queue_depth, 0);
    assert_eq!(status.estimated_bytes, 0);
}

#[test]
fn test_decode_failure_installs_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let path = dir.path().join("junk.png");
    std::fs::write(&path, b"definitely not a png").unwrap();
    let req = ImageRequest::file(path);

    assert!(engine.get_image(&req).is_none());
    // Give the worker a moment to fail; the key stays absent.
    std::thread::sleep(Duration::from_millis(100));
    assert!(engine.cached_keys().is_empty());
}

#[test]
fn test_status_reports_entries_and_size() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    write_png(&dir, "a.png", 10, 10);
    let req = ImageRequest::file(dir.path().join("a.png")).with_preview(false);

    engine.get_image(&req);
    assert!(wait_for(&engine, &req, |e, r| e.get_image(r).is_some()));

    let status = engine.status();
    assert_eq!(status.entries, 1);
    // 10 * 10 RGBA pixels
    assert_eq!(status.estimated_bytes, 400);
    assert!(status.uptime > Duration::ZERO);
}

#[test]
fn test_shutdown_joins_workers() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    engine.shutdown();
}

#[test]
fn test_logging_toggle() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    assert!(!engine.is_logging_enabled());
    engine.set_logging_enabled(true);
    assert!(engine.is_logging_enabled());
    engine.log_status();
}
