//! Progress tracking for batch channel resolution.
//!
//! This module provides the `SyncProgressTracker`, which counts the outcome of every channel in a
//! batch and logs progress on a wall-clock cadence. The orchestrator creates one per batch and
//! turns it into `SyncStats` when the batch completes.
//!
//! Time is read from `tokio::time::Instant` so paused-clock tests can drive it.

use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Service for tracking synchronization progress
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// Number of channel ids in this batch
    total: usize,
    /// Channel ids handled so far, whatever the outcome
    processed: usize,
    /// Answered from the funding transaction cache
    cache_hits: usize,
    /// Resolved from chain data during this batch
    newly_resolved: usize,
    /// Skipped after a resolution failure
    failures: usize,
    started_at: Instant,
    /// Last time progress was logged
    last_logged_at: Instant,
    log_interval: Duration,
}

impl SyncProgressTracker {
    /// Create a new progress tracker for a batch of `total` channels.
    pub fn new(total: usize, log_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            total,
            processed: 0,
            cache_hits: 0,
            newly_resolved: 0,
            failures: 0,
            started_at: now,
            last_logged_at: now,
            log_interval,
        }
    }

    pub fn record_cache_hit(&mut self) {
        self.processed += 1;
        self.cache_hits += 1;
    }

    pub fn record_resolved(&mut self) {
        self.processed += 1;
        self.newly_resolved += 1;
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failures += 1;
    }

    /// Share of the batch processed so far, in percent.
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f64 * 100.0 / self.total as f64
    }

    /// Log progress if the log interval has elapsed since the last line, or when forced.
    ///
    /// Returns whether a line was logged.
    pub fn log_progress(&mut self, force: bool) -> bool {
        if !force && self.last_logged_at.elapsed() < self.log_interval {
            return false;
        }

        info!(
            "Sync progress: {}/{} channels ({:.1}%), elapsed {:.1}s",
            self.processed,
            self.total,
            self.percent_complete(),
            self.started_at.elapsed().as_secs_f64()
        );
        self.last_logged_at = Instant::now();
        true
    }

    /// Get sync statistics as a SyncStats struct
    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            total: self.total,
            processed: self.processed,
            cache_hits: self.cache_hits,
            newly_resolved: self.newly_resolved,
            failures: self.failures,
            elapsed: self.started_at.elapsed(),
        }
    }
}

/// Statistics about a completed batch
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStats {
    pub total: usize,
    pub processed: usize,
    pub cache_hits: usize,
    pub newly_resolved: usize,
    pub failures: usize,
    pub elapsed: Duration,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "{}/{} channels in {:.1}s: {} newly resolved, {} cached{}",
            self.processed,
            self.total,
            self.elapsed.as_secs_f64(),
            self.newly_resolved,
            self.cache_hits,
            if self.failures == 0 {
                String::new()
            } else {
                format!(", {} failed", self.failures)
            }
        )
    }
}
