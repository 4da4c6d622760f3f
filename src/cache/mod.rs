//! Concurrent cache for decoded images with dual retention policies.
//!
//! Entries are held either strongly (until explicit eviction) or as
//! collectible entries that a background reclaim pass may evict under
//! memory pressure.

mod daemon;
mod entry;
mod store;

pub use daemon::ReclaimDaemon;
pub use entry::{CacheEntry, Fidelity, Retention};
pub use store::ResourceCache;
