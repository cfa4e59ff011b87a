//! Types for the bitcoind JSON-RPC collaborator

use crate::utils::btc_to_sat;

use serde::{Deserialize, Serialize};

/// Block as returned by `getblock <hash> 1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// The block hash.
    pub hash: String,
    /// The block height.
    pub height: u32,
    /// Block timestamp in unix seconds.
    pub time: u64,
    /// Transaction ids in block order.
    pub tx: Vec<String>,
}

/// Transaction as returned by `decoderawtransaction`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecodedTransaction {
    pub txid: String,
    #[serde(default)]
    pub vsize: Option<u64>,
    pub vout: Vec<TxOutput>,
}

/// A single transaction output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TxOutput {
    /// Output value in BTC as reported by the node.
    #[serde(default)]
    pub value: Option<f64>,
    /// Position of the output within the transaction.
    pub n: u32,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: ScriptPubKey,
}

impl TxOutput {
    /// Output value in satoshis, if the node reported one.
    pub fn value_sat(&self) -> Option<u64> {
        self.value.map(btc_to_sat)
    }
}

/// Output script details. Nodes before v22 report `addresses`, newer ones `address`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScriptPubKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(rename = "type", default)]
    pub script_type: Option<String>,
}

impl ScriptPubKey {
    /// Check whether this script pays the given address
    pub fn pays_to(&self, address: &str) -> bool {
        self.address.as_deref() == Some(address) || self.addresses.iter().any(|a| a == address)
    }
}

/// Entry of `getrawmempool true`, keyed by txid on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MempoolEntry {
    /// Filled in from the map key.
    #[serde(skip)]
    pub txid: String,
    pub vsize: u64,
    /// Fee breakdown reported by nodes since v0.19.
    #[serde(default)]
    pub fees: Option<MempoolFees>,
    /// Legacy flat fee field.
    #[serde(default)]
    pub fee: Option<f64>,
}

impl MempoolEntry {
    /// Transaction fee in satoshis, zero when the node reported none.
    pub fn fee_sat(&self) -> u64 {
        self.fees
            .as_ref()
            .map(|fees| fees.base)
            .or(self.fee)
            .map(btc_to_sat)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MempoolFees {
    pub base: f64,
}

/// JSON-RPC 1.0 response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Error types for calls to the blockchain backend
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Node returned error {code}: {message}")]
    NodeError { code: i64, message: String },

    #[error("No data returned for {0}")]
    NoData(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
