//! Engine status reporting.
//!
//! Purely observational: a [`EngineStatus`] snapshot never affects control
//! flow.

use std::fmt;
use std::time::Duration;

/// A point-in-time snapshot of engine state.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    /// Time since the engine was constructed
    pub uptime: Duration,
    /// Number of cache entries currently held
    pub entries: usize,
    /// Estimated resident size in bytes over all held buffers
    pub estimated_bytes: usize,
    /// Pending full-load requests
    pub load_queue_depth: usize,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Uptime: {:.1}s", self.uptime.as_secs_f64())?;
        writeln!(f, "Loaded images: {}", self.entries)?;
        writeln!(
            f,
            "Estimated loaded images size: {} kB",
            self.estimated_bytes / 1024
        )?;
        write!(f, "Queued images: {}", self.load_queue_depth)
    }
}
