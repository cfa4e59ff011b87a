use crate::sync::types::{AddressHistory, FundingTxRecord, SyncError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

const FUNDING_TXS_FILENAME: &str = "funding_txs.json";
const FUNDING_TXS_METADATA_FILENAME: &str = "funding_txs.meta.json";

/// Repository for the channel funding transaction table
#[async_trait::async_trait]
pub trait FundingTxRepository {
	async fn save(&self, records: &HashMap<String, FundingTxRecord>) -> Result<(), SyncError>;
	async fn load(&self) -> Result<Option<HashMap<String, FundingTxRecord>>, SyncError>;
}

/// Repository for the watched address's confirmed history
#[async_trait::async_trait]
pub trait WalletHistoryRepository {
	async fn save(&self, history: &AddressHistory) -> Result<(), SyncError>;
	async fn load(&self, address: &str) -> Result<Option<AddressHistory>, SyncError>;
}

async fn ensure_dir(dir: &Path) -> Result<(), SyncError> {
	tokio::fs::create_dir_all(dir).await?;
	Ok(())
}

/// File-based implementation of FundingTxRepository
pub struct FileFundingTxRepository {
	data_dir: PathBuf,
}

impl FileFundingTxRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_records_filename(&self) -> PathBuf {
		self.data_dir.join(FUNDING_TXS_FILENAME)
	}

	fn get_metadata_filename(&self) -> PathBuf {
		self.data_dir.join(FUNDING_TXS_METADATA_FILENAME)
	}
}

#[async_trait::async_trait]
impl FundingTxRepository for FileFundingTxRepository {
	async fn save(&self, records: &HashMap<String, FundingTxRecord>) -> Result<(), SyncError> {
		ensure_dir(&self.data_dir).await?;

		// Sorted keys keep the file stable between flushes
		let ordered: BTreeMap<&String, &FundingTxRecord> = records.iter().collect();
		let content = serde_json::to_string(&ordered).map_err(|e| {
			SyncError::ParseError(format!("Failed to serialize funding transactions: {}", e))
		})?;

		let filename = self.get_records_filename();
		tokio::fs::write(&filename, content).await?;

		let metadata = serde_json::json!({
			"record_count": records.len(),
			"timestamp": chrono::Utc::now().to_rfc3339(),
		});
		tokio::fs::write(self.get_metadata_filename(), metadata.to_string()).await?;

		info!(
			"Saved {} funding transactions to {:?}",
			records.len(),
			filename
		);
		Ok(())
	}

	async fn load(&self) -> Result<Option<HashMap<String, FundingTxRecord>>, SyncError> {
		let filename = self.get_records_filename();

		if !filename.exists() {
			return Ok(None);
		}

		let content = tokio::fs::read_to_string(&filename).await?;

		let records: HashMap<String, FundingTxRecord> =
			serde_json::from_str(&content).map_err(|e| {
				SyncError::ParseError(format!("Failed to parse funding transaction file: {}", e))
			})?;

		Ok(Some(records))
	}
}

/// File-based implementation of WalletHistoryRepository
pub struct FileWalletHistoryRepository {
	data_dir: PathBuf,
}

impl FileWalletHistoryRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_history_filename(&self, address: &str) -> PathBuf {
		self.data_dir
			.join(format!("wallet_history_{}.json", address))
	}
}

#[async_trait::async_trait]
impl WalletHistoryRepository for FileWalletHistoryRepository {
	async fn save(&self, history: &AddressHistory) -> Result<(), SyncError> {
		ensure_dir(&self.data_dir).await?;

		let content = serde_json::to_string_pretty(history).map_err(|e| {
			SyncError::ParseError(format!("Failed to serialize wallet history: {}", e))
		})?;

		let filename = self.get_history_filename(&history.address);
		tokio::fs::write(&filename, content).await?;

		info!(
			"Saved {} confirmed transactions for {} to {:?}",
			history.txids.len(),
			history.address,
			filename
		);
		Ok(())
	}

	async fn load(&self, address: &str) -> Result<Option<AddressHistory>, SyncError> {
		let filename = self.get_history_filename(address);

		if !filename.exists() {
			return Ok(None);
		}

		let content = tokio::fs::read_to_string(&filename).await?;

		let history: AddressHistory = serde_json::from_str(&content).map_err(|e| {
			SyncError::ParseError(format!("Failed to parse wallet history file: {}", e))
		})?;

		Ok(Some(history))
	}
}
