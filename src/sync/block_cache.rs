//! Bounded in-memory cache of recently fetched blocks.
//!
//! Channels funded in the same block share one `getblockhash` + `getblock` round trip. The cache
//! is bounded by entry count only. When it grows past capacity the lowest heights are dropped in
//! one batch, which matches the roughly height-ordered access of a bulk sync without per-access
//! bookkeeping. A low block that was just used can still be evicted.

use crate::rpc::Block;

use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Default maximum number of cached blocks.
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 100;
/// Default number of lowest heights dropped when the cache overflows.
pub const DEFAULT_EVICTION_BATCH: usize = 10;

#[derive(Debug)]
pub struct BlockCache {
    blocks: HashMap<u32, Arc<Block>>,
    capacity: usize,
    eviction_batch: usize,
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_EVICTION_BATCH)
    }
}

impl BlockCache {
    pub fn with_capacity(capacity: usize, eviction_batch: usize) -> Self {
        Self {
            blocks: HashMap::with_capacity(capacity + 1),
            capacity,
            eviction_batch: eviction_batch.max(1),
        }
    }

    pub fn get(&self, height: u32) -> Option<Arc<Block>> {
        self.blocks.get(&height).cloned()
    }

    /// Insert or overwrite the block at `height`, then enforce the capacity bound.
    pub fn put(&mut self, height: u32, block: Arc<Block>) {
        self.blocks.insert(height, block);
        self.evict_if_over_capacity();
    }

    /// Drop the lowest heights while the cache holds more than `capacity` blocks.
    ///
    /// Returns the number of evicted blocks.
    pub fn evict_if_over_capacity(&mut self) -> usize {
        let mut evicted = 0;

        while self.blocks.len() > self.capacity {
            let lowest = self
                .blocks
                .keys()
                .copied()
                .sorted_unstable()
                .take(self.eviction_batch)
                .collect::<Vec<u32>>();

            for height in &lowest {
                self.blocks.remove(height);
            }
            evicted += lowest.len();
        }

        if evicted > 0 {
            debug!(
                "Evicted {} blocks from block cache, {} remain",
                evicted,
                self.blocks.len()
            );
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, height: u32) -> bool {
        self.blocks.contains_key(&height)
    }
}
