//! Blockchain RPC integration module
//!
//! This module provides the backend seam used by resolution and wallet monitoring, the wire types
//! returned by a bitcoind-compatible node, and an HTTP JSON-RPC client implementing that seam.

/// Backend trait consumed by the sync engine
mod backend;
/// JSON-RPC client for bitcoind
mod client;
/// Type definitions for node responses
mod types;

pub use backend::ChainBackend;
pub use client::BitcoinRpcClient;
pub use types::*;
