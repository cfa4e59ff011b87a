//!
//! JSON-RPC client for a bitcoind-compatible node.
//!
//! This module provides an async client for the node's JSON-RPC interface over HTTP. It maps the
//! handful of calls the resolver needs onto [`ChainBackend`] and converts node-reported errors into
//! [`RpcError`]. Timeouts are enforced by the underlying HTTP client.

use super::backend::ChainBackend;
use super::types::*;
use crate::config::RpcConfig;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// bitcoind JSON-RPC client
#[derive(Clone)]
pub struct BitcoinRpcClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// The node's RPC endpoint.
	rpc_url: String,
	/// Basic auth credentials, if the node requires them.
	credentials: Option<(String, Option<String>)>,
	/// Monotonic JSON-RPC request id.
	next_id: Arc<AtomicU64>,
}

impl BitcoinRpcClient {
	/// Create a new RPC client.
	///
	/// # Arguments
	/// * `config` - Endpoint, credentials and request timeout.
	///
	/// # Returns
	/// A new `BitcoinRpcClient`, or an `RpcError` if the HTTP client cannot be built.
	pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.build()?;

		Ok(Self {
			http_client,
			rpc_url: config.url.clone(),
			credentials: config
				.user
				.clone()
				.map(|user| (user, config.password.clone())),
			next_id: Arc::new(AtomicU64::new(0)),
		})
	}

	/// Execute a JSON-RPC call.
	///
	/// # Arguments
	/// * `method` - The RPC method name.
	/// * `params` - Positional parameters as a JSON array.
	///
	/// # Returns
	/// The deserialized `result` field, or an `RpcError` if the request or the node fails.
	pub async fn call<T: DeserializeOwned>(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<T, RpcError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request_body = json!({
			"jsonrpc": "1.0",
			"id": id,
			"method": method,
			"params": params,
		});

		debug!("RPC call {} #{}", method, id);

		let mut request = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request_body);
		if let Some((user, password)) = &self.credentials {
			request = request.basic_auth(user, password.as_ref());
		}

		let response = request.send().await?;

		// bitcoind answers RPC-level failures with HTTP 500 and a JSON error body, so the body is
		// read before the status is considered.
		let status = response.status();
		let body = response.text().await?;
		let envelope: RpcResponse<T> = match serde_json::from_str(&body) {
			Ok(envelope) => envelope,
			Err(e) if status.is_success() => return Err(RpcError::JsonError(e)),
			Err(_) => {
				return Err(RpcError::Unavailable(format!(
					"{} returned HTTP {}",
					method, status
				)));
			}
		};

		if let Some(error) = envelope.error {
			return Err(RpcError::NodeError {
				code: error.code,
				message: error.message,
			});
		}

		envelope
			.result
			.ok_or_else(|| RpcError::NoData(method.to_string()))
	}
}

#[async_trait::async_trait]
impl ChainBackend for BitcoinRpcClient {
	async fn get_address_transactions(&self, address: &str) -> Result<Vec<String>, RpcError> {
		self.call("getaddresstxids", json!([{ "addresses": [address] }]))
			.await
	}

	async fn get_raw_mempool_verbose(&self) -> Result<Vec<MempoolEntry>, RpcError> {
		let entries: BTreeMap<String, MempoolEntry> =
			self.call("getrawmempool", json!([true])).await?;

		Ok(entries
			.into_iter()
			.map(|(txid, mut entry)| {
				entry.txid = txid;
				entry
			})
			.collect())
	}

	async fn get_raw_transaction(&self, txid: &str) -> Result<String, RpcError> {
		self.call("getrawtransaction", json!([txid, false])).await
	}

	async fn decode_raw_transaction(&self, raw_tx: &str) -> Result<DecodedTransaction, RpcError> {
		self.call("decoderawtransaction", json!([raw_tx])).await
	}

	async fn get_block_hash(&self, height: u32) -> Result<String, RpcError> {
		self.call("getblockhash", json!([height])).await
	}

	async fn get_block(&self, hash: &str) -> Result<Block, RpcError> {
		self.call("getblock", json!([hash, 1])).await
	}
}
