mod channel;
mod config;
mod rpc;
mod sync;
#[cfg(test)]
mod test_utils;
mod utils;
mod wallet;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::rpc::{BitcoinRpcClient, ChainBackend};
use crate::sync::state_persistence::StatePersistenceService;
use crate::sync::{Resolution, SyncOrchestrator};

const DEFAULT_CONFIG_PATH: &str = "scid-resolver.toml";

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let args: Vec<String> = std::env::args().skip(1).collect();
	let config_path = args
		.first()
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

	let config = match Config::load(&config_path) {
		Ok(config) => config,
		Err(e) => {
			error!("Failed to load configuration: {}", e);
			return;
		}
	};

	let client = match BitcoinRpcClient::new(&config.rpc) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create RPC client: {}", e);
			return;
		}
	};
	let backend: Arc<dyn ChainBackend> = Arc::new(client);
	let persistence = Arc::new(StatePersistenceService::new(config.data_dir.clone()));

	let orchestrator = Arc::new(SyncOrchestrator::new(
		backend,
		persistence,
		config.watch_address.clone(),
		config.sync.sync_config(),
	));

	match args.get(1).map(String::as_str) {
		Some("resolve") => {
			let Some(channel_id) = args.get(2) else {
				error!("Usage: scid-resolver <config> resolve <short_channel_id>");
				return;
			};
			resolve_command(&orchestrator, channel_id).await;
		}
		Some("snapshot") => {
			if config.watch_address.is_none() {
				error!("No watch_address configured, nothing to snapshot");
				return;
			}
			orchestrator.init().await;
			match wallet_snapshot_json(&orchestrator).await {
				Ok(json) => println!("{}", json),
				Err(e) => error!("Failed to serialize wallet snapshot: {}", e),
			}
		}
		Some(other) => error!("Unknown command: {}", other),
		None => {
			orchestrator.init().await;
			run_service(orchestrator, &config).await;
		}
	}
}

/// Resolve one channel from the persisted cache or the chain and print it as JSON.
///
/// The wallet monitor is not scanned. The cache is flushed only when the record was newly
/// resolved.
async fn resolve_command(orchestrator: &SyncOrchestrator, channel_id: &str) -> Option<Resolution> {
	orchestrator.load_cache().await;

	let Some(resolution) = orchestrator.resolve(channel_id).await else {
		error!("Could not resolve {}", channel_id);
		return None;
	};

	match serde_json::to_string_pretty(resolution.record()) {
		Ok(json) => println!("{}", json),
		Err(e) => error!("Failed to serialize funding transaction: {}", e),
	}
	if let Resolution::Resolved(_) = resolution {
		orchestrator.checkpoint().await;
	}
	Some(resolution)
}

async fn wallet_snapshot_json(orchestrator: &SyncOrchestrator) -> Result<String, serde_json::Error> {
	serde_json::to_string_pretty(orchestrator.wallet_snapshot().await.as_ref())
}

/// Start a batch every interval until Ctrl-C, then flush and exit.
async fn run_service(orchestrator: Arc<SyncOrchestrator>, config: &Config) {
	info!(
		"Starting channel sync service with {} cached funding transactions, batch every {}s",
		orchestrator.cached_channels().await,
		config.sync.batch_interval().as_secs()
	);
	let mut ticker = tokio::time::interval(config.sync.batch_interval());

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				if orchestrator.is_running() {
					info!("Previous batch still running, skipping this tick");
					continue;
				}

				let channel_ids = match load_channel_ids(&config.channel_list).await {
					Ok(ids) => ids,
					Err(e) => {
						warn!("Failed to read channel list {:?}: {}", config.channel_list, e);
						continue;
					}
				};

				let orchestrator = orchestrator.clone();
				tokio::spawn(async move {
					orchestrator.run_batch(&channel_ids).await;
				});
			}
			_ = tokio::signal::ctrl_c() => {
				info!("Shutting down, flushing funding transaction cache");
				orchestrator.checkpoint().await;
				break;
			}
		}
	}
}

/// Read newline-separated short channel ids, skipping blanks and `#` comments.
async fn load_channel_ids(path: &Path) -> Result<Vec<String>, std::io::Error> {
	let content = tokio::fs::read_to_string(path).await?;
	Ok(content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.map(str::to_string)
		.collect())
}
