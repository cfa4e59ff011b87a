//! Watched address monitor.
//!
//! This module provides the `WalletMonitor`, which shortens confirmation-detection latency for one
//! address by scanning the node's mempool for transactions paying it. Each refresh also fetches the
//! address's confirmed history, which the orchestrator stores alongside the funding cache.
//!
//! A refresh either completes and replaces the snapshot in a single assignment, or fails and leaves
//! the previous snapshot untouched. Readers never observe a partial scan.

use crate::rpc::{ChainBackend, DecodedTransaction};
use crate::sync::{AddressHistory, SyncError};
use crate::utils::format_btc_amount;
use crate::wallet::types::{MempoolMatch, WalletMempoolSnapshot};

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct WalletMonitor {
    backend: Arc<dyn ChainBackend>,
    address: String,
    snapshot: RwLock<Arc<WalletMempoolSnapshot>>,
}

impl WalletMonitor {
    pub fn new(backend: Arc<dyn ChainBackend>, address: String) -> Self {
        Self {
            backend,
            address,
            snapshot: RwLock::new(Arc::new(WalletMempoolSnapshot::default())),
        }
    }

    /// Current snapshot of unconfirmed transactions paying the watched address.
    pub async fn get_snapshot(&self) -> Arc<WalletMempoolSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Rescan the backend and replace the snapshot.
    ///
    /// Returns the address's confirmed history on success. On failure the error is logged, the
    /// previous snapshot is kept and `None` is returned.
    pub async fn refresh(&self) -> Option<AddressHistory> {
        match self.scan().await {
            Ok((history, snapshot)) => {
                info!(
                    "Wallet monitor {}: {} confirmed, {} unconfirmed transactions ({} BTC pending)",
                    self.address,
                    history.txids.len(),
                    snapshot.len(),
                    format_btc_amount(snapshot.total_amount_sat())
                );
                for entry in &snapshot.entries {
                    info!(
                        "Unconfirmed {}: {} BTC, fee {} BTC, {} vB",
                        entry.txid,
                        format_btc_amount(entry.amount_sat),
                        format_btc_amount(entry.fee_sat),
                        entry.vsize
                    );
                }

                *self.snapshot.write().await = Arc::new(snapshot);
                Some(history)
            }
            Err(e) => {
                error!("Wallet monitor scan for {} failed: {}", self.address, e);
                None
            }
        }
    }

    async fn scan(&self) -> Result<(AddressHistory, WalletMempoolSnapshot), SyncError> {
        let txids = self.backend.get_address_transactions(&self.address).await?;
        let history = AddressHistory {
            address: self.address.clone(),
            txids,
            updated_at: chrono::Utc::now(),
        };

        let mempool = self.backend.get_raw_mempool_verbose().await?;
        let mut entries = Vec::new();

        for entry in mempool {
            let raw_tx = self.backend.get_raw_transaction(&entry.txid).await?;
            let tx = self.backend.decode_raw_transaction(&raw_tx).await?;

            if let Some(amount_sat) = self.amount_paid(&tx) {
                entries.push(MempoolMatch {
                    fee_sat: entry.fee_sat(),
                    txid: entry.txid,
                    amount_sat,
                    vsize: entry.vsize,
                });
            }
        }

        Ok((
            history,
            WalletMempoolSnapshot {
                entries,
                refreshed_at: Some(chrono::Utc::now()),
            },
        ))
    }

    /// Sum of the valued outputs of `tx` paying the watched address, `None` if there are none.
    fn amount_paid(&self, tx: &DecodedTransaction) -> Option<u64> {
        let mut matched = false;
        let mut amount_sat = 0u64;

        for output in &tx.vout {
            if !output.script_pub_key.pays_to(&self.address) {
                continue;
            }
            match output.value_sat() {
                Some(value_sat) => {
                    matched = true;
                    amount_sat += value_sat;
                }
                None => warn!(
                    "Skipping output {} of {} paying {}: backend returned no value",
                    output.n, tx.txid, self.address
                ),
            }
        }

        matched.then_some(amount_sat)
    }
}
