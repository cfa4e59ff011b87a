//! Persistent cache of resolved funding transactions.
//!
//! Funding records never change once resolved, so the cache only grows. It is loaded once at
//! startup and flushed wholesale; the watched address's confirmed history is carried alongside
//! and persisted as its own record.

use crate::sync::state_persistence::StatePersistenceService;
use crate::sync::types::{AddressHistory, FundingTxRecord, SyncError};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

pub struct FundingTxCache {
    records: HashMap<String, FundingTxRecord>,
    wallet_history: Option<AddressHistory>,
    persistence: Arc<StatePersistenceService>,
}

impl FundingTxCache {
    /// Create an empty cache backed by `persistence`. Call [`FundingTxCache::load`] to restore
    /// the previous snapshot.
    pub fn new(persistence: Arc<StatePersistenceService>) -> Self {
        Self {
            records: HashMap::new(),
            wallet_history: None,
            persistence,
        }
    }

    /// Restore the persisted snapshot.
    ///
    /// Never fails: a missing snapshot leaves the cache empty and a corrupt one is logged and
    /// discarded.
    pub async fn load(&mut self, watched_address: Option<&str>) {
        self.records = match self.persistence.load_funding_txs().await {
            Ok(Some(records)) => records,
            Ok(None) => HashMap::new(),
            Err(e) => {
                error!("Funding transaction cache is unreadable, starting empty: {}", e);
                HashMap::new()
            }
        };
        info!("Loaded {} funding transactions from disk", self.records.len());

        self.wallet_history = match watched_address {
            Some(address) => match self.persistence.load_wallet_history(address).await {
                Ok(history) => history,
                Err(e) => {
                    error!("Wallet history for {} is unreadable, discarding: {}", address, e);
                    None
                }
            },
            None => None,
        };
    }

    pub fn get(&self, channel_id: &str) -> Option<&FundingTxRecord> {
        self.records.get(channel_id)
    }

    pub fn put(&mut self, channel_id: String, record: FundingTxRecord) {
        self.records.insert(channel_id, record);
    }

    #[cfg(test)]
    pub fn contains(&self, channel_id: &str) -> bool {
        self.records.contains_key(channel_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn wallet_history(&self) -> Option<&AddressHistory> {
        self.wallet_history.as_ref()
    }

    pub fn set_wallet_history(&mut self, history: AddressHistory) {
        self.wallet_history = Some(history);
    }

    /// Write the full cache to disk, overwriting the previous snapshot.
    pub async fn flush(&self) -> Result<(), SyncError> {
        self.persistence.save_funding_txs(&self.records).await?;
        if let Some(history) = &self.wallet_history {
            self.persistence.save_wallet_history(history).await?;
        }
        Ok(())
    }
}
