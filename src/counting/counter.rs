use super::window::WindowKey;
use ahash::{AHashSet, RandomState};
use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use std::hash::BuildHasher;
use tracing::debug;

const NUM_SHARDS: usize = 16;

/// Final count of a window that was closed by [`UniqueCounter::advance_window`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowExport {
    /// Key of the window that was closed
    pub key: WindowKey,
    /// Distinct ids recorded in that window
    pub count: u64,
    /// Windows between the closed one and the new current one (0 on a normal
    /// minute boundary). They never had member sets and produce no export
    /// record.
    pub skipped_windows: u64,
}

/// Member set of one window, split across hash shards
struct WindowState {
    key: WindowKey,
    shards: [CachePadded<Mutex<AHashSet<i64>>>; NUM_SHARDS],
}

impl WindowState {
    fn new(key: WindowKey) -> Self {
        WindowState {
            key,
            shards: std::array::from_fn(|_| CachePadded::new(Mutex::new(AHashSet::new()))),
        }
    }

    #[inline]
    fn insert(&self, shard_idx: usize, id: i64) -> bool {
        debug_assert!(shard_idx < NUM_SHARDS, "Shard index {} out of bounds", shard_idx);
        self.shards[shard_idx].lock().insert(id)
    }

    fn len(&self) -> u64 {
        self.shards.iter().map(|s| s.lock().len() as u64).sum()
    }
}

/// Concurrent per-minute distinct-id counter
///
/// Exactly one window is resident at a time. `track` and `current_count`
/// share the read side of the window lock and contend only on the shard an
/// id hashes to. `advance_window` takes the write side, so a `track` racing
/// a rollover lands wholly in the old window or wholly in the new one.
pub struct UniqueCounter {
    current: RwLock<WindowState>,
    hasher: RandomState,
}

impl UniqueCounter {
    /// Create a counter whose current window is the one containing `now_ms`
    pub fn new(now_ms: u64) -> Self {
        let key = WindowKey::for_millis(now_ms);
        debug!("Unique counter starting in window {}", key);
        UniqueCounter {
            current: RwLock::new(WindowState::new(key)),
            hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard_for(&self, id: i64) -> usize {
        (self.hasher.hash_one(id) as usize) % NUM_SHARDS
    }

    /// Record `id` in the current window. Returns `true` if it was not yet
    /// present in that window.
    #[inline]
    pub fn track(&self, id: i64) -> bool {
        let shard_idx = self.shard_for(id);
        let window = self.current.read();
        window.insert(shard_idx, id)
    }

    /// Distinct ids in the current window at the time of the call
    pub fn current_count(&self) -> u64 {
        self.current.read().len()
    }

    pub fn current_key(&self) -> WindowKey {
        self.current.read().key
    }

    /// Close the current window if `now_ms` falls in a later one.
    ///
    /// Installs a fresh empty window for `now_ms`, evicts the outgoing one and
    /// returns its final count. Returns `None` when `now_ms` is still inside
    /// (or before) the current window.
    pub fn advance_window(&self, now_ms: u64) -> Option<WindowExport> {
        let new_key = WindowKey::for_millis(now_ms);
        if new_key <= self.current.read().key {
            return None;
        }

        let outgoing = {
            let mut current = self.current.write();
            // Another caller may have advanced between the two locks
            if new_key <= current.key {
                return None;
            }
            std::mem::replace(&mut *current, WindowState::new(new_key))
        };

        // `outgoing` is no longer reachable from `track`, so its size is final.
        let export = WindowExport {
            key: outgoing.key,
            count: outgoing.len(),
            skipped_windows: new_key.steps_since(outgoing.key).saturating_sub(1),
        };
        debug!(
            "Window {} closed with {} unique ids, now in window {}",
            export.key, export.count, new_key
        );
        Some(export)
    }

    /// Verify all invariants hold for this counter
    #[cfg(debug_assertions)]
    pub fn verify_invariants(&self) {
        let window = self.current.read();
        for (idx, shard) in window.shards.iter().enumerate() {
            for id in shard.lock().iter() {
                debug_assert_eq!(
                    self.shard_for(*id),
                    idx,
                    "Invariant violated: id {} stored in shard {} of window {}",
                    id,
                    idx,
                    window.key
                );
            }
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    pub fn verify_invariants(&self) {}
}
