//! Mempool watch for a single address.
//!
//! - `monitor`: polls the backend for the watched address's confirmed history and for unconfirmed
//!   transactions paying it.
//! - `types`: the snapshot handed to readers.

/// Watched address monitor
pub mod monitor;
pub mod types;

pub use monitor::WalletMonitor;
pub use types::*;
