//! Service configuration with TOML file support.

use crate::sync::SyncConfig;
use crate::sync::state_persistence::CheckpointConfig;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read config file {path:?}: {source}")]
	ReadError {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("Invalid config: {0}")]
	ParseError(#[from] toml::de::Error),
}

/// Configuration for the resolver service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub rpc: RpcConfig,

	/// Directory holding the persisted caches.
	#[serde(default = "default_data_dir")]
	pub data_dir: PathBuf,

	/// Address whose unconfirmed transactions are watched.
	#[serde(default)]
	pub watch_address: Option<String>,

	/// Newline-separated short channel ids to resolve on every batch.
	#[serde(default = "default_channel_list")]
	pub channel_list: PathBuf,

	#[serde(default)]
	pub sync: SyncSettings,
}

/// Connection settings for the bitcoind JSON-RPC endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
	pub url: String,
	#[serde(default)]
	pub user: Option<String>,
	#[serde(default)]
	pub password: Option<String>,
	#[serde(default = "default_rpc_timeout_secs")]
	pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
	pub progress_interval_secs: u64,
	pub checkpoint_interval_secs: u64,
	/// How often the service starts a new batch.
	pub batch_interval_secs: u64,
	pub block_cache_capacity: usize,
	pub block_cache_eviction_batch: usize,
}

impl Default for SyncSettings {
	fn default() -> Self {
		Self {
			progress_interval_secs: 10,
			checkpoint_interval_secs: 60,
			batch_interval_secs: 600,
			block_cache_capacity: 100,
			block_cache_eviction_batch: 10,
		}
	}
}

impl SyncSettings {
	pub fn sync_config(&self) -> SyncConfig {
		SyncConfig {
			progress_interval: Duration::from_secs(self.progress_interval_secs),
			checkpoint: CheckpointConfig {
				interval: Duration::from_secs(self.checkpoint_interval_secs),
			},
			block_cache_capacity: self.block_cache_capacity,
			block_cache_eviction_batch: self.block_cache_eviction_batch,
		}
	}

	pub fn batch_interval(&self) -> Duration {
		Duration::from_secs(self.batch_interval_secs.max(1))
	}
}

fn default_data_dir() -> PathBuf {
	PathBuf::from("./data")
}

fn default_channel_list() -> PathBuf {
	PathBuf::from("./channels.txt")
}

fn default_rpc_timeout_secs() -> u64 {
	30
}

impl Config {
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&content)
	}

	pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(s)?)
	}
}
