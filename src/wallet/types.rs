use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unconfirmed transaction paying the watched address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolMatch {
	pub txid: String,
	/// Sum of all outputs paying the watched address, in satoshis.
	pub amount_sat: u64,
	pub fee_sat: u64,
	pub vsize: u64,
}

/// Unconfirmed transactions paying the watched address as of the last completed scan.
///
/// Each scan produces a whole new snapshot; entries that left the mempool simply do not appear
/// in the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletMempoolSnapshot {
	pub entries: Vec<MempoolMatch>,
	/// When the scan completed; `None` before the first successful scan.
	pub refreshed_at: Option<DateTime<Utc>>,
}

impl WalletMempoolSnapshot {
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[cfg(test)]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn total_amount_sat(&self) -> u64 {
		self.entries.iter().map(|entry| entry.amount_sat).sum()
	}
}
