//! imgcache - In-process asynchronous image cache and loader.
//!
//! Callers request a decoded image derived from a source (local file,
//! bundled resource, or remote URI) plus decode parameters, and get back
//! immediately whatever is already available: nothing, a cheap low-quality
//! preview, or the fully decoded result. Full decodes (and any needed
//! downloads) happen on worker threads and become visible to later calls.
//!
//! # High-Level API
//!
//! ```no_run
//! use imgcache::config::EngineConfig;
//! use imgcache::engine::ImageEngine;
//! use imgcache::request::{ImageRequest, TargetSize};
//!
//! let engine = ImageEngine::new(EngineConfig::default())?;
//!
//! let request = ImageRequest::file("photo.png")
//!     .with_target(TargetSize { width: 100, height: 50 });
//!
//! // Poll every frame; first calls may yield a preview, later calls the
//! // full decode at exactly 100x50.
//! let image = engine.get_image(&request);
//! # Ok::<(), imgcache::engine::EngineError>(())
//! ```

pub mod buffer;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod decode;
pub mod diagnostics;
pub mod download;
pub mod engine;
pub mod logging;
pub mod queue;
pub mod request;

pub use buffer::DecodedImage;
pub use cache::Retention;
pub use config::EngineConfig;
pub use engine::{EngineError, ImageEngine};
pub use request::{ImageRequest, ImageSource, TargetSize};
