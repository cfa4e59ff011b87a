//! Channel Synchronization Module
//!
//! This module provides the core logic for resolving short channel ids to their funding
//! transactions and keeping that resolution cheap across runs. It is composed of several
//! submodules, each responsible for a specific aspect of the sync process:
//!
//! - `orchestrator`: The main entry point. Runs batches single-flight, checkpoints, and refreshes the wallet monitor.
//! - `resolver`: Resolves one channel id through the caches and the chain backend.
//! - `block_cache`: Bounded cache of recently fetched blocks.
//! - `funding_cache`: Persistent cache of resolved funding transactions.
//! - `state_persistence` / `repositories`: Saving and loading cache state.
//! - `progress_tracker`: Per-batch counters and progress logging.

/// Bounded block cache
pub mod block_cache;
/// Persistent funding transaction cache
pub mod funding_cache;
/// Main coordinator for batch sync
pub mod orchestrator;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// File-based storage of cache state
pub mod repositories;
/// Funding transaction resolution
pub mod resolver;
/// Persistence service and checkpoint configuration
pub mod state_persistence;
pub mod types;

pub use orchestrator::*;
pub use types::*;
