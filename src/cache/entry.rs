//! Cache entry types: retention policy, fidelity and the entry itself.

use crate::buffer::DecodedImage;
use std::sync::Arc;
use std::time::Instant;

/// How strongly the cache holds a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retention {
    /// Held until explicitly unloaded or cleaned up; never reclaimed.
    Strong,
    /// Eligible for eviction by the reclaim pass under memory pressure.
    /// Callers must treat "present earlier, gone now" as a plain miss.
    Collectible,
}

/// Whether an entry holds the cheap preview or the final full decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    /// Low-quality placeholder produced inline by dispatch.
    Preview,
    /// Final decode honoring the request's sub-sample and target size.
    Full,
}

/// A cached decoded image with its retention policy.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Shared decoded buffer
    pub image: Arc<DecodedImage>,
    /// Retention policy configured by the request
    pub retention: Retention,
    /// Preview or full decode
    pub fidelity: Fidelity,
    /// Last access time, used to order collectible eviction
    pub last_access: Instant,
}

impl CacheEntry {
    /// Create an entry holding the given buffer.
    pub fn new(image: Arc<DecodedImage>, retention: Retention, fidelity: Fidelity) -> Self {
        Self {
            image,
            retention,
            fidelity,
            last_access: Instant::now(),
        }
    }

    /// Refresh the access time.
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    /// Estimated resident size of the held buffer in bytes.
    pub fn estimated_bytes(&self) -> usize {
        self.image.estimated_bytes()
    }
}
