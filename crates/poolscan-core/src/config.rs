//! Scanner configuration and state types.

use std::time::Duration;

use alloy_primitives::{address, keccak256, Address, B256};
use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;
use crate::error::ScanError;
use crate::strategy::RetrievalMode;
use crate::types::{FilterSpec, TopicLayout, POOL_CREATED_SIGNATURE};

/// Uniswap V3 factory on Base.
pub const DEFAULT_FACTORY: Address = address!("33128a8fC17869897dcE68Ed026d694621f6FDfD");

pub const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";

/// Configuration for a scanner instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// HTTP JSON-RPC endpoint used for head and range queries.
    pub rpc_url: String,
    /// WebSocket endpoint; required for subscribe mode.
    pub ws_url: Option<String>,
    /// Contract whose events are scanned.
    pub contract_address: Address,
    /// Canonical event signature; hashed to topic0 unless `topic0` is set.
    pub event_signature: String,
    pub topic0: Option<B256>,
    pub layout: TopicLayout,
    pub mode: RetrievalMode,
    /// Pause between successful poll iterations (milliseconds).
    pub poll_interval_ms: u64,
    /// Bound on every RPC call (milliseconds).
    pub request_timeout_ms: u64,
    /// Pause after a failed poll iteration (milliseconds).
    pub retry_delay_ms: u64,
    /// First block to scan; `None` starts at the current head.
    pub start_block: Option<u64>,
    /// Widest range sent in one `eth_getLogs` call; `None` = unbounded.
    pub max_block_range: Option<u64>,
    pub max_reconnects: u32,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// Switch to polling once the reconnect budget is spent.
    pub fallback_to_poll: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            ws_url: None,
            contract_address: DEFAULT_FACTORY,
            event_signature: POOL_CREATED_SIGNATURE.into(),
            topic0: None,
            layout: TopicLayout::FeeInData,
            mode: RetrievalMode::Poll,
            poll_interval_ms: 15_000,
            request_timeout_ms: 10_000,
            retry_delay_ms: 5_000,
            start_block: None,
            max_block_range: None,
            max_reconnects: 5,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
            fallback_to_poll: true,
        }
    }
}

impl ScannerConfig {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.rpc_url.is_empty() {
            return Err(ScanError::Config("rpc_url must not be empty".into()));
        }
        if self.poll_interval_ms == 0 || self.request_timeout_ms == 0 || self.retry_delay_ms == 0 {
            return Err(ScanError::Config(
                "poll_interval_ms, request_timeout_ms and retry_delay_ms must be non-zero".into(),
            ));
        }
        if self.max_block_range == Some(0) {
            return Err(ScanError::Config("max_block_range must be at least 1".into()));
        }
        if self.mode == RetrievalMode::Subscribe && self.ws_url.is_none() {
            return Err(ScanError::Config("subscribe mode requires ws_url".into()));
        }
        if self.topic0.is_none() && self.event_signature.is_empty() {
            return Err(ScanError::Config(
                "either topic0 or event_signature must be set".into(),
            ));
        }
        Ok(())
    }

    /// topic0 of the scanned event.
    pub fn signature_hash(&self) -> B256 {
        self.topic0
            .unwrap_or_else(|| keccak256(self.event_signature.as_bytes()))
    }

    pub fn filter(&self) -> FilterSpec {
        FilterSpec::new(self.contract_address, self.signature_hash(), self.layout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            max_attempts: self.max_reconnects,
            initial: Duration::from_millis(self.reconnect_initial_ms),
            max: Duration::from_millis(self.reconnect_max_ms),
            ..BackoffConfig::default()
        }
    }
}

/// Runtime state of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScannerState {
    /// Not yet started.
    Idle,
    /// Scanning block ranges.
    Polling,
    /// Following a push feed.
    Subscribed,
    /// Waiting out a transient failure.
    Backoff,
    /// Shut down on request.
    Stopped,
    /// Ended by an unrecoverable error.
    Failed,
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Polling => write!(f, "polling"),
            Self::Subscribed => write!(f, "subscribed"),
            Self::Backoff => write!(f, "backoff"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
