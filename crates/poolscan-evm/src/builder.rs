//! Fluent builder API for creating scanners.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use poolscan_core::sink::MemorySink;
//! use poolscan_core::strategy::RetrievalMode;
//! use poolscan_evm::{MemoryChain, ScannerBuilder};
//!
//! let scanner = ScannerBuilder::new()
//!     .mode(RetrievalMode::Subscribe)
//!     .ws_url("wss://base-mainnet.example/ws")
//!     .max_reconnects(3)
//!     .build(Arc::new(MemoryChain::new()), Arc::new(MemorySink::new()))
//!     .unwrap();
//! ```

use std::sync::Arc;

use alloy_primitives::{Address, B256};

use poolscan_core::client::ChainClient;
use poolscan_core::config::ScannerConfig;
use poolscan_core::error::ScanError;
use poolscan_core::sink::EventSink;
use poolscan_core::strategy::RetrievalMode;
use poolscan_core::types::TopicLayout;

use crate::scanner::Scanner;

/// Fluent builder for [`ScannerConfig`] and [`Scanner`].
#[derive(Default)]
pub struct ScannerBuilder {
    config: ScannerConfig,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self {
            config: ScannerConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Set the HTTP JSON-RPC endpoint.
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.rpc_url = url.into();
        self
    }

    /// Set the WebSocket endpoint used by subscribe mode.
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.config.ws_url = Some(url.into());
        self
    }

    /// Set the contract to scan.
    pub fn contract(mut self, address: Address) -> Self {
        self.config.contract_address = address;
        self
    }

    /// Override topic0 instead of hashing the event signature.
    pub fn topic0(mut self, topic0: B256) -> Self {
        self.config.topic0 = Some(topic0);
        self
    }

    pub fn layout(mut self, layout: TopicLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn mode(mut self, mode: RetrievalMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Backfill from this block instead of starting at the head.
    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = Some(block);
        self
    }

    /// Widest block range per `eth_getLogs` call.
    pub fn max_block_range(mut self, blocks: u64) -> Self {
        self.config.max_block_range = Some(blocks);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.config.max_reconnects = n;
        self
    }

    /// Set initial and maximum reconnect backoff in milliseconds.
    pub fn reconnect_backoff_ms(mut self, initial: u64, max: u64) -> Self {
        self.config.reconnect_initial_ms = initial;
        self.config.reconnect_max_ms = max;
        self
    }

    pub fn fallback_to_poll(mut self, enabled: bool) -> Self {
        self.config.fallback_to_poll = enabled;
        self
    }

    /// Build the `ScannerConfig`.
    pub fn build_config(self) -> ScannerConfig {
        self.config
    }

    /// Validate the configuration and build a scanner over `client`.
    pub fn build(
        self,
        client: Arc<dyn ChainClient>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Scanner, ScanError> {
        Scanner::new(self.config, client, sink)
    }
}
