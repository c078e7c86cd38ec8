//! JSON-RPC implementation of [`ChainClient`].
//!
//! Head and range queries go through any [`RpcTransport`] (HTTP in
//! production); subscriptions open a dedicated WebSocket connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use poolscan_core::client::{ChainClient, LogSubscription};
use poolscan_core::error::ScanError;
use poolscan_core::types::{BlockRange, FilterSpec, LogRecord};
use poolscan_rpc::log::{parse_hex_u64, LogFilterParams, RawLog};
use poolscan_rpc::{ws, RpcTransport, TransportError};

/// A [`ChainClient`] speaking Ethereum JSON-RPC.
pub struct RpcChainClient<T> {
    transport: T,
    ws_url: Option<String>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl<T: RpcTransport> RpcChainClient<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            transport,
            ws_url: None,
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Enable subscriptions against this WebSocket endpoint.
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<R, ScanError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match tokio::time::timeout(self.timeout, self.transport.call(id, method, params)).await {
            Ok(result) => result.map_err(map_transport),
            Err(_) => Err(ScanError::Network(format!(
                "{method} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl<T: RpcTransport> ChainClient for RpcChainClient<T> {
    async fn get_head(&self) -> Result<u64, ScanError> {
        let hex: String = self.call("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&hex).ok_or_else(|| ScanError::rpc(format!("invalid block number '{hex}'")))
    }

    async fn fetch_logs(
        &self,
        range: BlockRange,
        filter: &FilterSpec,
    ) -> Result<Vec<LogRecord>, ScanError> {
        let params = LogFilterParams::range(
            range.from,
            range.to,
            filter.contract_address.to_string(),
            filter.event_signature_hash.to_string(),
        );
        let params = serde_json::to_value(params).map_err(|e| ScanError::Other(e.to_string()))?;
        let raw: Vec<RawLog> = self.call("eth_getLogs", vec![params]).await?;

        let mut logs = Vec::with_capacity(raw.len());
        for log in raw.iter().filter(|l| !l.is_removed()) {
            let record = log_record(log).map_err(ScanError::rpc)?;
            if filter.matches(&record) {
                logs.push(record);
            }
        }
        logs.sort_by_key(LogRecord::position);

        tracing::debug!(%range, count = logs.len(), "fetched logs");
        Ok(logs)
    }

    async fn open_subscription(&self, filter: &FilterSpec) -> Result<LogSubscription, ScanError> {
        let url = self
            .ws_url
            .as_deref()
            .ok_or_else(|| ScanError::Config("subscriptions require a WebSocket URL".into()))?;
        let params = LogFilterParams::live(
            filter.contract_address.to_string(),
            filter.event_signature_hash.to_string(),
        );
        let params = serde_json::to_value(params).map_err(|e| ScanError::Other(e.to_string()))?;

        let mut sub = tokio::time::timeout(self.timeout, ws::subscribe::<RawLog>(url, "logs", params))
            .await
            .map_err(|_| {
                ScanError::Network(format!(
                    "eth_subscribe timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(map_transport)?;

        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let filter = filter.clone();

        // Owns the socket; aborting it closes the connection.
        let forwarder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    Some(raw) = sub.items.recv() => {
                        if raw.is_removed() {
                            continue;
                        }
                        match log_record(&raw) {
                            Ok(record) if filter.matches(&record) => {
                                if log_tx.send(record).is_err() {
                                    return;
                                }
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!(error = %e, "dropping malformed pushed log"),
                        }
                    }
                    Some(err) = sub.errors.recv() => {
                        let _ = err_tx.send(ScanError::Subscription(err.to_string()));
                        return;
                    }
                    else => {
                        let _ = err_tx.send(ScanError::Subscription("feed closed".into()));
                        return;
                    }
                }
            }
        });

        Ok(LogSubscription::new(log_rx, err_rx).with_task(forwarder.abort_handle()))
    }
}

fn map_transport(e: TransportError) -> ScanError {
    match e {
        TransportError::Rpc(err) => ScanError::Rpc {
            code: err.code,
            message: err.message,
        },
        e if e.is_connectivity() => ScanError::Network(e.to_string()),
        e => ScanError::rpc(e.to_string()),
    }
}

/// Convert a wire log into a [`LogRecord`]. Pending logs are rejected.
fn log_record(raw: &RawLog) -> Result<LogRecord, String> {
    let address: Address = raw
        .address
        .parse()
        .map_err(|e| format!("bad log address '{}': {e}", raw.address))?;
    let topics = raw
        .topics
        .iter()
        .map(|t| t.parse::<B256>().map_err(|e| format!("bad topic '{t}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let data = hex::decode(raw.data.strip_prefix("0x").unwrap_or(&raw.data))
        .map_err(|e| format!("bad log data: {e}"))?;
    let block_number = raw
        .block_number_u64()
        .ok_or_else(|| "log has no block number".to_string())?;
    let log_index = raw
        .log_index_u64()
        .ok_or_else(|| "log has no log index".to_string())?;
    let transaction_hash = match raw.transaction_hash.as_deref() {
        Some(h) => h
            .parse::<B256>()
            .map_err(|e| format!("bad transaction hash '{h}': {e}"))?,
        None => B256::ZERO,
    };
    Ok(LogRecord {
        address,
        topics,
        data: Bytes::from(data),
        block_number,
        transaction_hash,
        log_index,
    })
}
