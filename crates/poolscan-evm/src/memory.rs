//! In-memory chain client.
//!
//! Holds a head height and a set of logs in RAM and serves them through
//! [`ChainClient`]. Failures can be queued per call kind, and the live feed can
//! be fed or broken by hand. Useful for tests and offline dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use poolscan_core::client::{ChainClient, LogSubscription};
use poolscan_core::error::ScanError;
use poolscan_core::types::{BlockRange, FilterSpec, LogRecord};

#[derive(Default)]
struct Inner {
    head: u64,
    logs: Vec<LogRecord>,
    head_failures: VecDeque<ScanError>,
    fetch_failures: VecDeque<ScanError>,
    open_failures: VecDeque<ScanError>,
    fetched: Vec<BlockRange>,
    opened: usize,
    live: Option<(mpsc::UnboundedSender<LogRecord>, mpsc::UnboundedSender<ScanError>)>,
}

/// A scriptable [`ChainClient`] backed by memory.
#[derive(Default)]
pub struct MemoryChain {
    inner: Mutex<Inner>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, head: u64) {
        self.inner.lock().unwrap().head = head;
    }

    pub fn head(&self) -> u64 {
        self.inner.lock().unwrap().head
    }

    /// Add a log to the chain without pushing it to a live feed.
    pub fn push_log(&self, log: LogRecord) {
        self.inner.lock().unwrap().logs.push(log);
    }

    /// Add a log to the chain and push it to the live feed, if one is open.
    /// The head follows the log's block.
    pub fn emit(&self, log: LogRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner.head = inner.head.max(log.block_number);
        if let Some((tx, _)) = &inner.live {
            let _ = tx.send(log.clone());
        }
        inner.logs.push(log);
    }

    /// End the live feed with `err`.
    pub fn break_subscription(&self, err: ScanError) {
        if let Some((_, err_tx)) = self.inner.lock().unwrap().live.take() {
            let _ = err_tx.send(err);
        }
    }

    pub fn fail_next_head(&self, err: ScanError) {
        self.inner.lock().unwrap().head_failures.push_back(err);
    }

    pub fn fail_next_fetch(&self, err: ScanError) {
        self.inner.lock().unwrap().fetch_failures.push_back(err);
    }

    pub fn fail_next_open(&self, err: ScanError) {
        self.inner.lock().unwrap().open_failures.push_back(err);
    }

    /// Every range passed to `fetch_logs`, failed calls included.
    pub fn fetched_ranges(&self) -> Vec<BlockRange> {
        self.inner.lock().unwrap().fetched.clone()
    }

    /// Number of subscriptions successfully opened.
    pub fn subscriptions_opened(&self) -> usize {
        self.inner.lock().unwrap().opened
    }

    pub fn has_live_subscription(&self) -> bool {
        self.inner
            .lock()
            .unwrap()
            .live
            .as_ref()
            .is_some_and(|(tx, _)| !tx.is_closed())
    }
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn get_head(&self) -> Result<u64, ScanError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.head_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(inner.head),
        }
    }

    async fn fetch_logs(
        &self,
        range: BlockRange,
        filter: &FilterSpec,
    ) -> Result<Vec<LogRecord>, ScanError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetched.push(range);
        if let Some(err) = inner.fetch_failures.pop_front() {
            return Err(err);
        }
        let mut logs: Vec<LogRecord> = inner
            .logs
            .iter()
            .filter(|l| l.block_number >= range.from && l.block_number <= range.to)
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        logs.sort_by_key(LogRecord::position);
        Ok(logs)
    }

    async fn open_subscription(&self, _filter: &FilterSpec) -> Result<LogSubscription, ScanError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.open_failures.pop_front() {
            return Err(err);
        }
        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        inner.live = Some((log_tx, err_tx));
        inner.opened += 1;
        Ok(LogSubscription::new(log_rx, err_rx))
    }
}

/// Builders for logs and events shared by tests.
pub mod fixtures {
    use alloy_primitives::{Address, Bytes, B256, U256};

    use poolscan_core::config::DEFAULT_FACTORY;
    use poolscan_core::types::{LogRecord, POOL_CREATED_SIGNATURE};

    /// A well-formed `PoolCreated` log (fee in data) at `block:index`.
    ///
    /// Token and pool addresses are derived from the position so every log
    /// decodes to a distinct event.
    pub fn pool_created_log(block: u64, index: u64) -> LogRecord {
        let seed = (block as u8).wrapping_mul(7).wrapping_add(index as u8);
        let mut data = Vec::with_capacity(96);
        data.extend_from_slice(&U256::from(3000u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(60u64).to_be_bytes::<32>());
        data.extend_from_slice(B256::left_padding_from(Address::repeat_byte(seed).as_slice()).as_slice());
        LogRecord {
            address: DEFAULT_FACTORY,
            topics: vec![
                alloy_primitives::keccak256(POOL_CREATED_SIGNATURE),
                B256::left_padding_from(Address::repeat_byte(0x11).as_slice()),
                B256::left_padding_from(Address::repeat_byte(0x22).as_slice()),
            ],
            data: Bytes::from(data),
            block_number: block,
            transaction_hash: B256::repeat_byte(seed),
            log_index: index,
        }
    }

    /// Same as [`pool_created_log`] but with truncated data.
    pub fn malformed_log(block: u64, index: u64) -> LogRecord {
        let mut log = pool_created_log(block, index);
        log.data = Bytes::from(log.data[..64].to_vec());
        log
    }
}
