use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};

use lru::LruCache;
use tracing::debug;

use crate::error::Error;

/// Default cache budget for decoded chunks.
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Byte-bounded LRU of decoded chunk plaintext, keyed by the chunk's
/// ciphertext hash, with per-key single-flight loading.
///
/// Concurrent `get_or_load` calls for the same key perform at most one
/// load; the others wait on a condvar and pick up the inserted entry. The
/// lock is never held across the load itself. If the leader fails, one of
/// the waiters retries as the new leader.
pub struct ChunkCache {
    capacity: usize,
    state: Mutex<CacheState>,
    loaded: Condvar,
}

struct CacheState {
    entries: LruCache<String, Arc<[u8]>>,
    bytes: usize,
    loading: HashSet<String>,
}

impl ChunkCache {
    pub fn new(capacity: usize) -> Self {
        ChunkCache {
            capacity,
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                bytes: 0,
                loading: HashSet::new(),
            }),
            loaded: Condvar::new(),
        }
    }

    /// Return the cached plaintext for `key`, loading it with `load` on a
    /// miss. Entries larger than the whole budget are returned but not
    /// retained.
    pub fn get_or_load<F>(&self, key: &str, load: F) -> Result<Arc<[u8]>, Error>
    where
        F: FnOnce() -> Result<Vec<u8>, Error>,
    {
        let mut state = self.state.lock().expect("cache lock poisoned");
        loop {
            if let Some(data) = state.entries.get(key) {
                debug!(chunk = key, "chunk cache hit");
                return Ok(data.clone());
            }
            if !state.loading.contains(key) {
                break;
            }
            state = self.loaded.wait(state).expect("cache lock poisoned");
        }
        state.loading.insert(key.to_string());
        drop(state);

        let result = load();

        let mut state = self.state.lock().expect("cache lock poisoned");
        state.loading.remove(key);
        let outcome = match result {
            Ok(data) => {
                let data: Arc<[u8]> = data.into();
                if data.len() <= self.capacity {
                    if let Some((_, old)) = state.entries.push(key.to_string(), data.clone()) {
                        state.bytes -= old.len();
                    }
                    state.bytes += data.len();
                    while state.bytes > self.capacity {
                        match state.entries.pop_lru() {
                            Some((_, evicted)) => state.bytes -= evicted.len(),
                            None => break,
                        }
                    }
                }
                Ok(data)
            }
            Err(err) => Err(err),
        };
        drop(state);
        self.loaded.notify_all();
        outcome
    }

    /// True when `key` is resident or a load for it is underway. Used to
    /// drop redundant prefetches without touching recency.
    pub fn is_cached_or_loading(&self, key: &str) -> bool {
        let state = self.state.lock().expect("cache lock poisoned");
        state.entries.contains(key) || state.loading.contains(key)
    }

    #[cfg(test)]
    fn resident_bytes(&self) -> usize {
        self.state.lock().expect("cache lock poisoned").bytes
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    #[test]
    fn hit_avoids_second_load() {
        let cache = ChunkCache::new(1024);
        let loads = AtomicU64::new(0);
        for _ in 0..2 {
            let data = cache
                .get_or_load("k", || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![7u8; 16])
                })
                .unwrap();
            assert_eq!(data.len(), 16);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn evicts_least_recently_used_past_budget() {
        let cache = ChunkCache::new(32);
        cache.get_or_load("a", || Ok(vec![0u8; 16])).unwrap();
        cache.get_or_load("b", || Ok(vec![1u8; 16])).unwrap();
        // Touch "a" so "b" is the eviction candidate.
        cache.get_or_load("a", || panic!("a should be cached")).unwrap();
        cache.get_or_load("c", || Ok(vec![2u8; 16])).unwrap();

        assert!(cache.is_cached_or_loading("a"));
        assert!(!cache.is_cached_or_loading("b"));
        assert!(cache.resident_bytes() <= 32);

        let reloaded = AtomicU64::new(0);
        cache
            .get_or_load("b", || {
                reloaded.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1u8; 16])
            })
            .unwrap();
        assert_eq!(reloaded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn oversized_entries_are_not_retained() {
        let cache = ChunkCache::new(8);
        let data = cache.get_or_load("big", || Ok(vec![9u8; 64])).unwrap();
        assert_eq!(data.len(), 64);
        assert!(!cache.is_cached_or_loading("big"));
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[test]
    fn concurrent_readers_share_one_load() {
        let cache = Arc::new(ChunkCache::new(1024));
        let loads = Arc::new(AtomicU64::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let loads = loads.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                cache
                    .get_or_load("shared", || {
                        loads.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(20));
                        Ok(vec![3u8; 8])
                    })
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.join().unwrap().len(), 8);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_leader_lets_a_waiter_retry() {
        let cache = Arc::new(ChunkCache::new(1024));
        let attempts = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let cache = cache.clone();
            let attempts = attempts.clone();
            handles.push(thread::spawn(move || {
                cache.get_or_load("flaky", move || {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        thread::sleep(std::time::Duration::from_millis(10));
                        Err(Error::Backend("transient".into()))
                    } else {
                        Ok(vec![4u8; 8])
                    }
                })
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().any(|r| r.is_ok()));
        assert!(attempts.load(Ordering::SeqCst) >= 1);
    }
}
