use crate::rpc::RpcError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolved funding transaction of a channel.
///
/// Records are immutable once resolved; a funding output never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingTxRecord {
	/// Timestamp of the block containing the funding transaction, unix seconds.
	pub timestamp: u64,
	pub txid: String,
	/// Value of the funding output in satoshis.
	pub value_sat: u64,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
	/// Served from the funding transaction cache without touching the backend.
	Cached(FundingTxRecord),
	/// Freshly resolved from chain data and inserted into the cache.
	Resolved(FundingTxRecord),
}

impl Resolution {
	pub fn record(&self) -> &FundingTxRecord {
		match self {
			Resolution::Cached(record) | Resolution::Resolved(record) => record,
		}
	}
}

/// Last known confirmed history of the watched address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressHistory {
	pub address: String,
	pub txids: Vec<String>,
	pub updated_at: DateTime<Utc>,
}

/// Error types for resolution, persistence and sync
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("RPC error: {0}")]
	RpcError(#[from] RpcError),

	#[error("Persistence parse error: {0}")]
	ParseError(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}
