use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::Error;
use crate::repo::Chunk;

/// Storage backends hand out raw shard bytes addressed by chunk identity
/// and shard index. Shard indices run `0..data_parts + parity_parts`; for
/// single-blob chunks only index 0 is ever requested. Errors are opaque to
/// the decode pipeline, which treats any failure as "shard unavailable".
pub trait Backend: Send + Sync {
    fn load_chunk(&self, chunk: &Chunk, shard_index: u32) -> Result<Vec<u8>, Error>;
}

/// In-memory backend keyed by `(sha_sum, shard_index)`. Counts loads and
/// supports dropping shards, which is what the fault-injection tests need.
#[derive(Default)]
pub struct MemoryBackend {
    shards: RwLock<HashMap<(String, u32), Vec<u8>>>,
    loads: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    pub fn insert(&self, chunk: &Chunk, shard_index: u32, data: Vec<u8>) {
        self.shards
            .write()
            .expect("backend lock poisoned")
            .insert((chunk.sha_sum.clone(), shard_index), data);
    }

    /// Simulate shard loss.
    pub fn remove(&self, chunk: &Chunk, shard_index: u32) {
        self.shards
            .write()
            .expect("backend lock poisoned")
            .remove(&(chunk.sha_sum.clone(), shard_index));
    }

    /// Total `load_chunk` calls, successful or not.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Backend for MemoryBackend {
    fn load_chunk(&self, chunk: &Chunk, shard_index: u32) -> Result<Vec<u8>, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.shards
            .read()
            .expect("backend lock poisoned")
            .get(&(chunk.sha_sum.clone(), shard_index))
            .cloned()
            .ok_or_else(|| {
                Error::Backend(format!(
                    "no shard {} for chunk {}",
                    shard_index, chunk.sha_sum
                ))
            })
    }
}
