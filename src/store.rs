//! Per-client fixed-window counters.
//!
//! The window length is always supplied by the caller, so a store never
//! holds its own idea of how long a window lasts.

use dashmap::DashMap;

use crate::client_key::ClientKey;

/// Counter state for one client - tracks requests in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry {
    pub count: u32,
    pub window_start_ms: u64,
}

impl WindowEntry {
    fn fresh(now_ms: u64) -> Self {
        Self {
            count: 0,
            window_start_ms: now_ms,
        }
    }

    /// Whether the window that started at `window_start_ms` is over at `now_ms`.
    pub fn is_expired(&self, now_ms: u64, window_ms: u64) -> bool {
        now_ms.saturating_sub(self.window_start_ms) >= window_ms
    }
}

/// Storage for window counters, injected into the limiter.
///
/// Increments for one key must be linearizable; different keys must not
/// block each other.
pub trait WindowStore: Send + Sync {
    /// Entry for `key`, created or reset to a zero count when missing or
    /// when `window_ms` has fully elapsed since its window started.
    fn get_or_create(&self, key: &ClientKey, now_ms: u64, window_ms: u64) -> WindowEntry;

    /// Like [`get_or_create`](Self::get_or_create), then count one request.
    fn increment(&self, key: &ClientKey, now_ms: u64, window_ms: u64) -> WindowEntry;

    /// Forget everything about `key`.
    fn reset_key(&self, key: &ClientKey);

    /// Drop entries whose window is over. Returns how many were removed.
    fn purge_expired(&self, now_ms: u64, window_ms: u64) -> usize;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store on a sharded map.
///
/// The shard write lock is held across each read-reset-increment, which
/// serializes updates to the same key while keys in other shards proceed.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<ClientKey, WindowEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, key: &ClientKey, now_ms: u64, window_ms: u64, hits: u32) -> WindowEntry {
        let mut entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| WindowEntry::fresh(now_ms));

        // window over..? start a new one
        if entry.is_expired(now_ms, window_ms) {
            *entry = WindowEntry::fresh(now_ms);
        }

        entry.count = entry.count.saturating_add(hits);
        *entry
    }
}

impl WindowStore for MemoryStore {
    fn get_or_create(&self, key: &ClientKey, now_ms: u64, window_ms: u64) -> WindowEntry {
        self.update(key, now_ms, window_ms, 0)
    }

    fn increment(&self, key: &ClientKey, now_ms: u64, window_ms: u64) -> WindowEntry {
        self.update(key, now_ms, window_ms, 1)
    }

    fn reset_key(&self, key: &ClientKey) {
        self.entries.remove(key);
    }

    fn purge_expired(&self, now_ms: u64, window_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(now_ms, window_ms));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
