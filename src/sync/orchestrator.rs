//! Batch sync orchestrator and integration point for all sync services.
//!
//! This module defines the `SyncOrchestrator`, which coordinates everything involved in resolving
//! a batch of short channel ids to their funding transactions. It owns the resolution engine (and
//! through it both caches), drives batches one at a time, checkpoints the funding transaction cache
//! while a batch runs, and refreshes the wallet monitor between batches.
//!
//! The orchestrator is responsible for:
//! - Loading the persisted funding transaction cache at startup
//! - Running at most one batch at a time; overlapping requests are dropped
//! - Processing channel ids strictly in input order, tolerating per-item failures
//! - Logging progress and checkpoint-flushing the cache on a wall-clock cadence
//! - Flushing once more at the end of a batch that resolved anything new
//! - Serving on-demand resolution and wallet snapshot queries
//!
//! The caches sit behind one async mutex that is taken per item, so queries may interleave with a
//! running batch.

use crate::rpc::ChainBackend;
use crate::sync::{
    block_cache::{BlockCache, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_EVICTION_BATCH},
    funding_cache::FundingTxCache,
    progress_tracker::{SyncProgressTracker, SyncStats},
    resolver::ResolutionEngine,
    state_persistence::{CheckpointConfig, StatePersistenceService},
    types::Resolution,
};
use crate::wallet::{WalletMempoolSnapshot, WalletMonitor};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Configuration for batch synchronization
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum time between two progress log lines
    pub progress_interval: Duration,
    pub checkpoint: CheckpointConfig,
    pub block_cache_capacity: usize,
    pub block_cache_eviction_batch: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_secs(10),
            checkpoint: CheckpointConfig::default(),
            block_cache_capacity: DEFAULT_BLOCK_CACHE_CAPACITY,
            block_cache_eviction_batch: DEFAULT_EVICTION_BATCH,
        }
    }
}

/// Marks the orchestrator as running for as long as it is alive.
///
/// Dropping the guard clears the flag, so a panic or a dropped batch future cannot leave the
/// orchestrator stuck in the running state.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn try_acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Main sync orchestrator that coordinates all sync components.
pub struct SyncOrchestrator {
    engine: Mutex<ResolutionEngine>,
    wallet_monitor: Option<WalletMonitor>,
    watch_address: Option<String>,
    running: AtomicBool,
    config: SyncConfig,
}

impl SyncOrchestrator {
    /// Create a new orchestrator with empty caches.
    ///
    /// Nothing is read from disk until [`SyncOrchestrator::init`] is called. Without a watch
    /// address no wallet monitor is run.
    pub fn new(
        backend: Arc<dyn ChainBackend>,
        persistence: Arc<StatePersistenceService>,
        watch_address: Option<String>,
        config: SyncConfig,
    ) -> Self {
        let block_cache =
            BlockCache::with_capacity(config.block_cache_capacity, config.block_cache_eviction_batch);
        let funding_cache = FundingTxCache::new(persistence);
        let wallet_monitor = watch_address
            .clone()
            .map(|address| WalletMonitor::new(backend.clone(), address));

        Self {
            engine: Mutex::new(ResolutionEngine::new(backend, block_cache, funding_cache)),
            wallet_monitor,
            watch_address,
            running: AtomicBool::new(false),
            config,
        }
    }

    /// Load the persisted funding transaction cache and take the first wallet snapshot.
    pub async fn init(&self) {
        self.load_cache().await;
        self.refresh_wallet().await;
    }

    /// Load the persisted funding transaction cache without touching the backend.
    pub async fn load_cache(&self) {
        self.engine
            .lock()
            .await
            .funding_cache_mut()
            .load(self.watch_address.as_deref())
            .await;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Resolve every channel id in `channel_ids`, in order.
    ///
    /// Returns `None` without doing anything if another batch is already running. Failures of
    /// individual channels are logged and counted; they never abort the batch.
    pub async fn run_batch<S: AsRef<str> + Sync>(&self, channel_ids: &[S]) -> Option<SyncStats> {
        let Some(_guard) = RunGuard::try_acquire(&self.running) else {
            debug!("Batch already running, skipping request for {} channels", channel_ids.len());
            return None;
        };

        info!("Starting sync of {} channels", channel_ids.len());

        let mut progress_tracker =
            SyncProgressTracker::new(channel_ids.len(), self.config.progress_interval);
        let mut last_checkpoint = Instant::now();

        for channel_id in channel_ids {
            let channel_id = channel_id.as_ref();
            let result = self.engine.lock().await.resolve(channel_id).await;

            match result {
                Ok(Some(Resolution::Resolved(_))) => progress_tracker.record_resolved(),
                Ok(Some(Resolution::Cached(_))) => progress_tracker.record_cache_hit(),
                Ok(None) => progress_tracker.record_failure(),
                Err(e) => {
                    warn!(
                        "Failed to resolve {}, backend timeout or invalid short channel id: {}",
                        channel_id, e
                    );
                    progress_tracker.record_failure();
                }
            }

            progress_tracker.log_progress(false);

            if last_checkpoint.elapsed() >= self.config.checkpoint.interval {
                self.checkpoint().await;
                last_checkpoint = Instant::now();
            }
        }

        progress_tracker.log_progress(true);
        let stats = progress_tracker.get_stats();

        if stats.newly_resolved > 0 {
            self.flush("final").await;
        }
        info!("{} new funding transactions resolved", stats.newly_resolved);
        info!("Sync completed: {}", stats.summary());
        {
            let engine = self.engine.lock().await;
            debug!(
                "Block cache holds {} blocks, {} funding transactions resolved since startup",
                engine.block_cache().len(),
                engine.resolved_total()
            );
        }

        self.refresh_wallet().await;

        Some(stats)
    }

    /// Flush the funding transaction cache to disk now.
    pub async fn checkpoint(&self) {
        self.flush("checkpoint").await;
    }

    async fn flush(&self, reason: &str) {
        let engine = self.engine.lock().await;
        let cache = engine.funding_cache();
        match cache.flush().await {
            Ok(()) => info!(
                "Flushed {} funding transactions to disk ({})",
                cache.len(),
                reason
            ),
            Err(e) => error!("Failed to flush funding transaction cache ({}): {}", reason, e),
        }
    }

    /// Rescan the watched address, if any, and keep its confirmed history for the next flush.
    pub async fn refresh_wallet(&self) {
        let Some(monitor) = &self.wallet_monitor else {
            return;
        };

        if let Some(history) = monitor.refresh().await {
            self.engine
                .lock()
                .await
                .funding_cache_mut()
                .set_wallet_history(history);
        }
    }

    /// Resolve a single channel on demand, sharing the batch caches.
    ///
    /// Nothing is flushed here; callers that want a newly resolved record on disk call
    /// [`SyncOrchestrator::checkpoint`] when they get `Resolution::Resolved`.
    pub async fn resolve(&self, channel_id: &str) -> Option<Resolution> {
        match self.engine.lock().await.resolve(channel_id).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(
                    "Failed to resolve {}, backend timeout or invalid short channel id: {}",
                    channel_id, e
                );
                None
            }
        }
    }

    /// Current wallet mempool snapshot; empty when no address is watched.
    pub async fn wallet_snapshot(&self) -> Arc<WalletMempoolSnapshot> {
        match &self.wallet_monitor {
            Some(monitor) => monitor.get_snapshot().await,
            None => Arc::new(WalletMempoolSnapshot::default()),
        }
    }

    /// Number of funding transactions currently cached.
    pub async fn cached_channels(&self) -> usize {
        self.engine.lock().await.funding_cache().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{PersistenceTracker, StubBackend, memory_persistence, output};
    use crate::sync::types::FundingTxRecord;
    use std::collections::HashMap;

    const WATCHED: &str = "bc1qwatched";

    /// Backend with one funding transaction per block at heights `1..=blocks`.
    fn stub_chain(blocks: u32) -> Arc<StubBackend> {
        let backend = StubBackend::new();
        for height in 1..=blocks {
            let txid = format!("fund{}", height);
            backend.add_block(height, 1_600_000_000 + height as u64, &["coinbase", &txid]);
            backend.add_transaction(&txid, vec![output(0.01 * height as f64, "bc1qchannel")]);
        }
        Arc::new(backend)
    }

    fn channel_ids(blocks: u32) -> Vec<String> {
        (1..=blocks).map(|height| format!("{}x1x0", height)).collect()
    }

    fn orchestrator(
        backend: Arc<StubBackend>,
        watch_address: Option<&str>,
    ) -> (SyncOrchestrator, PersistenceTracker) {
        let (persistence, tracker) = memory_persistence();
        let orchestrator = SyncOrchestrator::new(
            backend,
            persistence,
            watch_address.map(str::to_string),
            SyncConfig::default(),
        );
        (orchestrator, tracker)
    }

    #[tokio::test]
    async fn test_batch_resolves_and_flushes_once() {
        let (orchestrator, tracker) = orchestrator(stub_chain(3), None);
        orchestrator.init().await;

        let stats = orchestrator.run_batch(&channel_ids(3)).await.unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.newly_resolved, 3);
        assert_eq!(stats.failures, 0);
        assert_eq!(tracker.funding_saves(), 1);
        let stored = tracker.stored_funding().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored["2x1x0"].txid, "fund2");
        assert_eq!(stored["2x1x0"].value_sat, 2_000_000);
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_fully_cached_batch_does_not_flush() {
        let backend = stub_chain(3);
        let (orchestrator, tracker) = orchestrator(backend.clone(), None);
        let seeded: HashMap<String, FundingTxRecord> = channel_ids(3)
            .into_iter()
            .map(|id| {
                let record = FundingTxRecord {
                    timestamp: 1,
                    txid: format!("cached-{}", id),
                    value_sat: 1,
                };
                (id, record)
            })
            .collect();
        tracker.seed_funding(seeded);
        orchestrator.init().await;

        let stats = orchestrator.run_batch(&channel_ids(3)).await.unwrap();

        assert_eq!(stats.cache_hits, 3);
        assert_eq!(stats.newly_resolved, 0);
        assert_eq!(tracker.funding_saves(), 0);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_items_do_not_abort_batch() {
        let backend = stub_chain(3);
        backend.fail_height(2);
        let (orchestrator, tracker) = orchestrator(backend, None);
        orchestrator.init().await;

        let mut ids = channel_ids(3);
        ids.push("1x1x5".to_string());
        ids.push("garbage".to_string());
        let stats = orchestrator.run_batch(&ids).await.unwrap();

        assert_eq!(stats.processed, 5);
        assert_eq!(stats.newly_resolved, 2);
        assert_eq!(stats.failures, 3);
        let stored = tracker.stored_funding().unwrap();
        assert!(stored.contains_key("1x1x0"));
        assert!(stored.contains_key("3x1x0"));
        assert!(!stored.contains_key("2x1x0"));
        assert!(!stored.contains_key("1x1x5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_batch_is_a_no_op() {
        let backend = stub_chain(2);
        backend.set_block_delay(Duration::from_secs(5));
        let (orchestrator, tracker) = orchestrator(backend.clone(), None);
        orchestrator.init().await;

        let first_ids = channel_ids(1);
        let second_ids = channel_ids(2);
        let (first, second) = tokio::join!(
            orchestrator.run_batch(&first_ids),
            orchestrator.run_batch(&second_ids)
        );

        assert_eq!(first.unwrap().newly_resolved, 1);
        assert!(second.is_none());
        assert_eq!(orchestrator.cached_channels().await, 1);
        assert_eq!(backend.block_fetches(), 1);
        assert_eq!(tracker.funding_saves(), 1);

        // The guard is released once the first batch is done.
        let third = orchestrator.run_batch(&second_ids).await.unwrap();
        assert_eq!(third.newly_resolved, 1);
        assert_eq!(third.cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_batch_releases_guard() {
        let backend = stub_chain(3);
        backend.set_block_delay(Duration::from_secs(30));
        let (orchestrator, _tracker) = orchestrator(backend, None);
        orchestrator.init().await;

        let ids = channel_ids(3);
        let cancelled =
            tokio::time::timeout(Duration::from_secs(45), orchestrator.run_batch(&ids)).await;
        assert!(cancelled.is_err());
        assert!(!orchestrator.is_running());

        assert!(orchestrator.run_batch(&ids).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_flushes_every_interval() {
        let backend = stub_chain(5);
        // Each item costs one block fetch: items finish at 25s, 50s, 75s, 100s and 125s.
        backend.set_block_delay(Duration::from_secs(25));
        let (orchestrator, tracker) = orchestrator(backend, None);
        orchestrator.init().await;

        let stats = orchestrator.run_batch(&channel_ids(5)).await.unwrap();

        assert_eq!(stats.newly_resolved, 5);
        assert!(stats.elapsed >= Duration::from_secs(125));
        // One checkpoint after the 75s item, then the final flush.
        assert_eq!(tracker.funding_saves(), 2);
        assert_eq!(tracker.stored_funding().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_runs_even_without_new_records() {
        let backend = stub_chain(4);
        backend.set_block_delay(Duration::from_secs(40));
        let (orchestrator, tracker) = orchestrator(backend, None);
        orchestrator.init().await;

        // Every block is fetched but no transaction has output 5: items finish at 40s, 80s,
        // 120s and 160s without resolving anything.
        let ids: Vec<String> = (1..=4).map(|height| format!("{}x1x5", height)).collect();
        let stats = orchestrator.run_batch(&ids).await.unwrap();

        assert_eq!(stats.failures, 4);
        assert_eq!(stats.newly_resolved, 0);
        // Checkpoints after the 80s and 160s items, no final flush.
        assert_eq!(tracker.funding_saves(), 2);
    }

    #[tokio::test]
    async fn test_wallet_refreshed_at_startup_and_after_batch() {
        let backend = stub_chain(1);
        backend.set_address_txids(&["confirmed"]);
        backend.add_transaction("incoming", vec![output(0.25, WATCHED)]);
        let (orchestrator, tracker) = orchestrator(backend.clone(), Some(WATCHED));

        orchestrator.init().await;
        assert!(orchestrator.wallet_snapshot().await.is_empty());
        assert!(orchestrator.wallet_snapshot().await.refreshed_at.is_some());

        backend.add_mempool_entry("incoming", 0.00000300, 110);
        orchestrator.run_batch(&channel_ids(1)).await.unwrap();

        let snapshot = orchestrator.wallet_snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries[0].amount_sat, 25_000_000);

        orchestrator.checkpoint().await;
        let history = tracker.stored_wallet_history(WATCHED).unwrap();
        assert_eq!(history.txids, vec!["confirmed".to_string()]);
    }

    #[tokio::test]
    async fn test_on_demand_resolve_populates_shared_cache() {
        let backend = stub_chain(2);
        let (orchestrator, _tracker) = orchestrator(backend.clone(), None);
        orchestrator.init().await;

        let resolution = orchestrator.resolve("2x1x0").await.unwrap();
        assert!(matches!(resolution, Resolution::Resolved(_)));
        assert_eq!(resolution.record().txid, "fund2");
        assert!(orchestrator.resolve("2x1x9").await.is_none());

        let calls = backend.call_count();
        let stats = orchestrator.run_batch(&["2x1x0"]).await.unwrap();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(backend.call_count(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flushes_do_not_abort_batch() {
        let backend = stub_chain(3);
        // Items finish at 40s, 80s and 120s: one checkpoint after 80s, then the final flush.
        backend.set_block_delay(Duration::from_secs(40));
        backend.add_transaction("incoming", vec![output(0.1, WATCHED)]);
        let (orchestrator, tracker) = orchestrator(backend.clone(), Some(WATCHED));
        orchestrator.init().await;
        tracker.set_fail_saves(true);
        backend.add_mempool_entry("incoming", 0.00000300, 110);

        let stats = orchestrator.run_batch(&channel_ids(3)).await.unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.newly_resolved, 3);
        assert_eq!(stats.failures, 0);
        assert_eq!(tracker.funding_saves(), 2);
        assert!(tracker.stored_funding().is_none());
        assert_eq!(orchestrator.cached_channels().await, 3);
        assert_eq!(orchestrator.wallet_snapshot().await.len(), 1);
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_load_cache_skips_wallet_scan() {
        let backend = stub_chain(1);
        for i in 0..50 {
            let txid = format!("mempool{}", i);
            backend.add_transaction(&txid, vec![output(0.01, "bc1qsomeoneelse")]);
            backend.add_mempool_entry(&txid, 0.00000200, 120);
        }
        let (orchestrator, _tracker) = orchestrator(backend.clone(), Some(WATCHED));

        orchestrator.load_cache().await;
        assert_eq!(backend.call_count(), 0);
        assert!(orchestrator.wallet_snapshot().await.refreshed_at.is_none());

        orchestrator.resolve("1x1x0").await.unwrap();
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_no_wallet_monitor_without_address() {
        let (orchestrator, tracker) = orchestrator(stub_chain(1), None);
        orchestrator.init().await;
        orchestrator.run_batch(&channel_ids(1)).await.unwrap();

        let snapshot = orchestrator.wallet_snapshot().await;
        assert!(snapshot.refreshed_at.is_none());
        assert_eq!(tracker.wallet_saves(), 0);
    }
}
