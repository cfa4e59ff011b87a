//! State persistence service for channel resolution.
//!
//! This module provides the `StatePersistenceService`, which saves and restores the funding
//! transaction table and the watched address's confirmed history. It uses repository traits to
//! abstract the details of file-based persistence, so the cache can be rebuilt after a restart
//! without re-resolving every channel.
//!
//! Writes overwrite the previous snapshot in place. An interrupted write can leave a corrupt file
//! behind; loading treats that as an empty cache since everything is rebuildable from the chain.

use crate::sync::repositories::{
    FileFundingTxRepository, FileWalletHistoryRepository, FundingTxRepository,
    WalletHistoryRepository,
};
use crate::sync::types::{AddressHistory, FundingTxRecord, SyncError};

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Service for managing state persistence operations.
///
/// This service coordinates saving and loading of the funding transaction table and the wallet
/// history record using the appropriate repository implementations.
pub struct StatePersistenceService {
    funding_repo: Box<dyn FundingTxRepository + Send + Sync>,
    wallet_repo: Box<dyn WalletHistoryRepository + Send + Sync>,
}

impl StatePersistenceService {
    /// Create a new state persistence service for the given data directory.
    pub fn new(data_dir: PathBuf) -> Self {
        Self::with_repositories(
            Box::new(FileFundingTxRepository::new(data_dir.clone())),
            Box::new(FileWalletHistoryRepository::new(data_dir)),
        )
    }

    pub fn with_repositories(
        funding_repo: Box<dyn FundingTxRepository + Send + Sync>,
        wallet_repo: Box<dyn WalletHistoryRepository + Send + Sync>,
    ) -> Self {
        Self {
            funding_repo,
            wallet_repo,
        }
    }

    /// Save the full funding transaction table, replacing any previous snapshot.
    pub async fn save_funding_txs(
        &self,
        records: &HashMap<String, FundingTxRecord>,
    ) -> Result<(), SyncError> {
        self.funding_repo.save(records).await
    }

    /// Load the funding transaction table, if one has been saved.
    pub async fn load_funding_txs(
        &self,
    ) -> Result<Option<HashMap<String, FundingTxRecord>>, SyncError> {
        self.funding_repo.load().await
    }

    pub async fn save_wallet_history(&self, history: &AddressHistory) -> Result<(), SyncError> {
        self.wallet_repo.save(history).await
    }

    pub async fn load_wallet_history(
        &self,
        address: &str,
    ) -> Result<Option<AddressHistory>, SyncError> {
        self.wallet_repo.load(address).await
    }
}

/// Configuration for checkpoint saving.
///
/// Controls how much resolution work can be lost to a crash mid-batch.
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Flush the funding transaction cache at least this often during a batch.
    pub interval: Duration,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}
