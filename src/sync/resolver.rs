//! Channel funding transaction resolution.
//!
//! The `ResolutionEngine` turns a short channel id into the funding transaction it points at. It
//! answers from the funding transaction cache when it can, and otherwise walks block height ->
//! block -> transaction -> output through the backend, sharing fetched blocks through the
//! block cache.

use crate::channel::ShortChannelId;
use crate::rpc::{Block, ChainBackend};
use crate::sync::block_cache::BlockCache;
use crate::sync::funding_cache::FundingTxCache;
use crate::sync::types::{FundingTxRecord, Resolution, SyncError};

use std::sync::Arc;
use tracing::{debug, warn};

pub struct ResolutionEngine {
    backend: Arc<dyn ChainBackend>,
    block_cache: BlockCache,
    funding_cache: FundingTxCache,
    /// Total records resolved from chain data since construction.
    resolved_total: u64,
}

impl ResolutionEngine {
    pub fn new(
        backend: Arc<dyn ChainBackend>,
        block_cache: BlockCache,
        funding_cache: FundingTxCache,
    ) -> Self {
        Self {
            backend,
            block_cache,
            funding_cache,
            resolved_total: 0,
        }
    }

    /// Resolve the funding transaction of `channel_id`.
    ///
    /// Returns `Ok(None)` when the id does not point at a valued output (malformed id, index out
    /// of range, or an output the backend returned without a value); the failure is logged.
    /// Backend errors are returned to the caller, which decides whether to carry on.
    pub async fn resolve(&mut self, channel_id: &str) -> Result<Option<Resolution>, SyncError> {
        let scid = match ShortChannelId::decode(channel_id) {
            Ok(scid) => scid,
            Err(e) => {
                warn!("Cannot resolve {}: {}", channel_id, e);
                return Ok(None);
            }
        };

        // Cache keys are canonical so `700000x01x0` and `700000x1x0` share one entry.
        let key = scid.to_string();
        if let Some(record) = self.funding_cache.get(&key) {
            return Ok(Some(Resolution::Cached(record.clone())));
        }

        let block = self.block_at(scid.block_height).await?;

        let Some(txid) = block.tx.get(scid.tx_index as usize) else {
            warn!(
                "Cannot resolve {}: block {} has only {} transactions, invalid short channel id",
                channel_id,
                scid.block_height,
                block.tx.len()
            );
            return Ok(None);
        };

        let raw_tx = self.backend.get_raw_transaction(txid).await?;
        let tx = self.backend.decode_raw_transaction(&raw_tx).await?;

        let value_sat = tx
            .vout
            .get(scid.output_index as usize)
            .and_then(|output| output.value_sat());
        let Some(value_sat) = value_sat else {
            warn!(
                "Cannot resolve {}: transaction {} has no valued output {}, backend timeout or invalid short channel id",
                channel_id, txid, scid.output_index
            );
            return Ok(None);
        };

        let record = FundingTxRecord {
            timestamp: block.time,
            txid: txid.clone(),
            value_sat,
        };
        self.funding_cache.put(key, record.clone());
        self.resolved_total += 1;

        debug!(
            "Resolved {} (scid {}) to {}",
            channel_id,
            scid.to_u64(),
            record.txid
        );
        Ok(Some(Resolution::Resolved(record)))
    }

    /// Block at `height`, from the block cache or fetched and cached.
    async fn block_at(&mut self, height: u32) -> Result<Arc<Block>, SyncError> {
        if let Some(block) = self.block_cache.get(height) {
            return Ok(block);
        }

        let hash = self.backend.get_block_hash(height).await?;
        let block = Arc::new(self.backend.get_block(&hash).await?);
        self.block_cache.put(height, block.clone());
        Ok(block)
    }

    pub fn resolved_total(&self) -> u64 {
        self.resolved_total
    }

    pub fn block_cache(&self) -> &BlockCache {
        &self.block_cache
    }

    pub fn funding_cache(&self) -> &FundingTxCache {
        &self.funding_cache
    }

    pub fn funding_cache_mut(&mut self) -> &mut FundingTxCache {
        &mut self.funding_cache
    }
}
