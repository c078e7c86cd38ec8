//! Log wire types for `eth_getLogs` and `eth_subscribe("logs")`.

use serde::{Deserialize, Serialize};

/// A raw EVM log as returned by the node (hex strings throughout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    /// `None` for pending logs.
    pub block_number: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    pub fn block_number_u64(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_hex_u64)
    }

    pub fn log_index_u64(&self) -> Option<u64> {
        self.log_index.as_deref().and_then(parse_hex_u64)
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }
}

/// Log filter object shared by `eth_getLogs` and `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<String>,
    pub address: String,
    /// Positional topic filters; only topic0 is used here.
    pub topics: Vec<String>,
}

impl LogFilterParams {
    /// Filter for a push subscription (no block bounds).
    pub fn live(address: impl Into<String>, topic0: impl Into<String>) -> Self {
        Self {
            from_block: None,
            to_block: None,
            address: address.into(),
            topics: vec![topic0.into()],
        }
    }

    /// Filter for an inclusive block range.
    pub fn range(from: u64, to: u64, address: impl Into<String>, topic0: impl Into<String>) -> Self {
        Self {
            from_block: Some(to_hex_quantity(from)),
            to_block: Some(to_hex_quantity(to)),
            ..Self::live(address, topic0)
        }
    }
}

/// Parse a hex quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

/// Encode a u64 as a JSON-RPC hex quantity (`0x`-prefixed, no leading zeros).
pub fn to_hex_quantity(n: u64) -> String {
    format!("{n:#x}")
}
