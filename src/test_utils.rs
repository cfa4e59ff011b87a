//! Test doubles for the chain backend and persistence.

use crate::rpc::{
    Block, ChainBackend, DecodedTransaction, MempoolEntry, MempoolFees, RpcError, ScriptPubKey,
    TxOutput,
};
use crate::sync::repositories::{FundingTxRepository, WalletHistoryRepository};
use crate::sync::state_persistence::StatePersistenceService;
use crate::sync::types::{AddressHistory, FundingTxRecord, SyncError};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Output paying `address`, for building stub transactions.
pub fn output(value_btc: f64, address: &str) -> TxOutput {
    TxOutput {
        value: Some(value_btc),
        n: 0,
        script_pub_key: ScriptPubKey {
            address: Some(address.to_string()),
            addresses: Vec::new(),
            script_type: Some("witness_v0_keyhash".to_string()),
        },
    }
}

#[derive(Default)]
struct StubState {
    blocks: HashMap<u32, Block>,
    transactions: HashMap<String, DecodedTransaction>,
    mempool: Vec<MempoolEntry>,
    address_txids: Vec<String>,
    failing_heights: HashSet<u32>,
    fail_mempool: bool,
    block_delay: Option<Duration>,
}

/// Controllable in-memory [`ChainBackend`].
///
/// Raw transactions are encoded as `raw:<txid>` so decoding maps straight back to the stored
/// transaction.
#[derive(Default)]
pub struct StubBackend {
    state: Mutex<StubState>,
    calls: AtomicUsize,
    block_fetches: AtomicUsize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&self, height: u32, time: u64, txids: &[&str]) {
        self.state.lock().unwrap().blocks.insert(
            height,
            Block {
                hash: format!("hash{}", height),
                height,
                time,
                tx: txids.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    pub fn add_transaction(&self, txid: &str, outputs: Vec<TxOutput>) {
        let vout = outputs
            .into_iter()
            .enumerate()
            .map(|(n, mut output)| {
                output.n = n as u32;
                output
            })
            .collect();
        self.state.lock().unwrap().transactions.insert(
            txid.to_string(),
            DecodedTransaction {
                txid: txid.to_string(),
                vsize: Some(150),
                vout,
            },
        );
    }

    pub fn add_mempool_entry(&self, txid: &str, fee_btc: f64, vsize: u64) {
        self.state.lock().unwrap().mempool.push(MempoolEntry {
            txid: txid.to_string(),
            vsize,
            fees: Some(MempoolFees { base: fee_btc }),
            fee: None,
        });
    }

    pub fn clear_mempool(&self) {
        self.state.lock().unwrap().mempool.clear();
    }

    pub fn set_address_txids(&self, txids: &[&str]) {
        self.state.lock().unwrap().address_txids = txids.iter().map(|t| t.to_string()).collect();
    }

    /// Make every block lookup at `height` fail like a timed out backend.
    pub fn fail_height(&self, height: u32) {
        self.state.lock().unwrap().failing_heights.insert(height);
    }

    pub fn set_fail_mempool(&self, fail: bool) {
        self.state.lock().unwrap().fail_mempool = fail;
    }

    /// Sleep this long in every `get_block`, to drive virtual time in paused-clock tests.
    pub fn set_block_delay(&self, delay: Duration) {
        self.state.lock().unwrap().block_delay = Some(delay);
    }

    /// Total backend calls of any kind.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn block_fetches(&self) -> usize {
        self.block_fetches.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ChainBackend for StubBackend {
    async fn get_address_transactions(&self, _address: &str) -> Result<Vec<String>, RpcError> {
        self.record_call();
        Ok(self.state.lock().unwrap().address_txids.clone())
    }

    async fn get_raw_mempool_verbose(&self) -> Result<Vec<MempoolEntry>, RpcError> {
        self.record_call();
        let state = self.state.lock().unwrap();
        if state.fail_mempool {
            return Err(RpcError::Unavailable("getrawmempool timed out".to_string()));
        }
        Ok(state.mempool.clone())
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<String, RpcError> {
        self.record_call();
        if self.state.lock().unwrap().transactions.contains_key(txid) {
            Ok(format!("raw:{}", txid))
        } else {
            Err(RpcError::NodeError {
                code: -5,
                message: format!("No such mempool or blockchain transaction {}", txid),
            })
        }
    }

    async fn decode_raw_transaction(&self, raw_tx: &str) -> Result<DecodedTransaction, RpcError> {
        self.record_call();
        let txid = raw_tx.strip_prefix("raw:").unwrap_or(raw_tx);
        self.state
            .lock()
            .unwrap()
            .transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| RpcError::NodeError {
                code: -22,
                message: "TX decode failed".to_string(),
            })
    }

    async fn get_block_hash(&self, height: u32) -> Result<String, RpcError> {
        self.record_call();
        let state = self.state.lock().unwrap();
        if state.failing_heights.contains(&height) {
            return Err(RpcError::Unavailable(format!(
                "getblockhash {} timed out",
                height
            )));
        }
        state
            .blocks
            .get(&height)
            .map(|block| block.hash.clone())
            .ok_or_else(|| RpcError::NodeError {
                code: -8,
                message: "Block height out of range".to_string(),
            })
    }

    async fn get_block(&self, hash: &str) -> Result<Block, RpcError> {
        self.record_call();
        self.block_fetches.fetch_add(1, Ordering::SeqCst);
        let (block, delay) = {
            let state = self.state.lock().unwrap();
            let block = state.blocks.values().find(|block| block.hash == hash).cloned();
            (block, state.block_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        block.ok_or_else(|| RpcError::NodeError {
            code: -5,
            message: "Block not found".to_string(),
        })
    }
}

/// Handle for inspecting in-memory persistence from a test.
#[derive(Clone, Default)]
pub struct PersistenceTracker {
    funding: Arc<Mutex<Option<HashMap<String, FundingTxRecord>>>>,
    wallet: Arc<Mutex<HashMap<String, AddressHistory>>>,
    funding_saves: Arc<AtomicUsize>,
    wallet_saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl PersistenceTracker {
    /// Pretend a previous run persisted `records`.
    pub fn seed_funding(&self, records: HashMap<String, FundingTxRecord>) {
        *self.funding.lock().unwrap() = Some(records);
    }

    /// Make every save fail like a full disk. Attempts are still counted.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn save_result(&self) -> Result<(), SyncError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SyncError::IoError(std::io::Error::other("no space left on device")));
        }
        Ok(())
    }

    pub fn funding_saves(&self) -> usize {
        self.funding_saves.load(Ordering::SeqCst)
    }

    pub fn wallet_saves(&self) -> usize {
        self.wallet_saves.load(Ordering::SeqCst)
    }

    pub fn stored_funding(&self) -> Option<HashMap<String, FundingTxRecord>> {
        self.funding.lock().unwrap().clone()
    }

    pub fn stored_wallet_history(&self, address: &str) -> Option<AddressHistory> {
        self.wallet.lock().unwrap().get(address).cloned()
    }
}

struct MemoryFundingTxRepository(PersistenceTracker);

#[async_trait::async_trait]
impl FundingTxRepository for MemoryFundingTxRepository {
    async fn save(&self, records: &HashMap<String, FundingTxRecord>) -> Result<(), SyncError> {
        self.0.funding_saves.fetch_add(1, Ordering::SeqCst);
        self.0.save_result()?;
        *self.0.funding.lock().unwrap() = Some(records.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<HashMap<String, FundingTxRecord>>, SyncError> {
        Ok(self.0.funding.lock().unwrap().clone())
    }
}

struct MemoryWalletHistoryRepository(PersistenceTracker);

#[async_trait::async_trait]
impl WalletHistoryRepository for MemoryWalletHistoryRepository {
    async fn save(&self, history: &AddressHistory) -> Result<(), SyncError> {
        self.0.wallet_saves.fetch_add(1, Ordering::SeqCst);
        self.0.save_result()?;
        self.0
            .wallet
            .lock()
            .unwrap()
            .insert(history.address.clone(), history.clone());
        Ok(())
    }

    async fn load(&self, address: &str) -> Result<Option<AddressHistory>, SyncError> {
        Ok(self.0.wallet.lock().unwrap().get(address).cloned())
    }
}

/// Persistence service backed by memory, plus a tracker counting its saves.
pub fn memory_persistence() -> (Arc<StatePersistenceService>, PersistenceTracker) {
    let tracker = PersistenceTracker::default();
    let service = StatePersistenceService::with_repositories(
        Box::new(MemoryFundingTxRepository(tracker.clone())),
        Box::new(MemoryWalletHistoryRepository(tracker.clone())),
    );
    (Arc::new(service), tracker)
}
