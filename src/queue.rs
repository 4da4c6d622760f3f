//! Deduplicated FIFO work queue drained by a pool of worker threads.
//!
//! Membership is set-like despite the FIFO order: an item that is pending or
//! currently being processed by a worker cannot be enqueued a second time.
//! [`WorkQueue::enqueue`] performs the "observe absent and mark reserved"
//! step atomically under one lock, so two racing callers can never both
//! reserve the same item.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Condvar, Mutex};

struct QueueState<T> {
    pending: VecDeque<T>,
    queued: HashSet<T>,
    in_flight: HashSet<T>,
    shutdown: bool,
}

/// Blocking dedup FIFO queue shared between dispatch and a worker pool.
///
/// Items move through three states: pending (enqueued, not yet taken),
/// in flight (taken by exactly one worker) and absent (completed or never
/// enqueued). `enqueue` refuses items that are pending or in flight.
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T: Eq + Hash + Clone> WorkQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                queued: HashSet::new(),
                in_flight: HashSet::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Atomically reserve and enqueue an item.
    ///
    /// Returns `false` without enqueueing when the item is already pending
    /// or in flight, or when the queue has been shut down.
    pub fn enqueue(&self, item: T) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.shutdown || state.queued.contains(&item) || state.in_flight.contains(&item) {
            return false;
        }
        state.queued.insert(item.clone());
        state.pending.push_back(item);
        drop(state);
        self.available.notify_one();
        true
    }

    /// Block until an item is available, marking it in flight.
    ///
    /// Returns `None` once the queue has been shut down; workers exit their
    /// loop on that signal.
    pub fn take(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(item) = state.pending.pop_front() {
                state.queued.remove(&item);
                state.in_flight.insert(item.clone());
                return Some(item);
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Mark an in-flight item as finished, making it reservable again.
    pub fn complete(&self, item: &T) {
        let mut state = self.state.lock().unwrap();
        state.in_flight.remove(item);
    }

    /// Whether the item is pending or in flight.
    pub fn contains(&self, item: &T) -> bool {
        let state = self.state.lock().unwrap();
        state.queued.contains(item) || state.in_flight.contains(item)
    }

    /// Remove a pending item. In-flight items are not touched.
    pub fn remove(&self, item: &T) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.queued.remove(item) {
            state.pending.retain(|queued| queued != item);
            true
        } else {
            false
        }
    }

    /// Number of pending items (in-flight items are not counted).
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Whether no items are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending item. In-flight work is left to finish.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.pending.clear();
        state.queued.clear();
    }

    /// Signal shutdown: wake every blocked worker so it can exit.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutdown = true;
        drop(state);
        self.available.notify_all();
    }
}

impl<T: Eq + Hash + Clone> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
