use super::types::*;

/// Blockchain backend consumed by resolution and the wallet monitor.
///
/// Implementations own their timeout and retry policy; every failure surfaces as an
/// [`RpcError`] and is treated by callers as terminal for the unit of work in progress.
#[async_trait::async_trait]
pub trait ChainBackend: Send + Sync {
	/// Confirmed transaction ids paying or spending `address`.
	async fn get_address_transactions(&self, address: &str) -> Result<Vec<String>, RpcError>;

	/// All mempool entries with fee and size metadata.
	async fn get_raw_mempool_verbose(&self) -> Result<Vec<MempoolEntry>, RpcError>;

	/// Raw transaction hex for `txid`.
	async fn get_raw_transaction(&self, txid: &str) -> Result<String, RpcError>;

	async fn decode_raw_transaction(&self, raw_tx: &str) -> Result<DecodedTransaction, RpcError>;

	async fn get_block_hash(&self, height: u32) -> Result<String, RpcError>;

	/// Block with its transaction id list.
	async fn get_block(&self, hash: &str) -> Result<Block, RpcError>;
}
