//! Shared types for the scanning pipeline.

use std::fmt;

use alloy_primitives::{keccak256, Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// Canonical signature of the factory's pool creation event.
pub const POOL_CREATED_SIGNATURE: &str = "PoolCreated(address,address,uint24,int24,address)";

// ─── BlockRange ──────────────────────────────────────────────────────────────

/// An inclusive span of block heights. Always `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Returns `None` if `from > to`.
    pub fn new(from: u64, to: u64) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    /// Number of blocks covered by the range.
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Split into consecutive sub-ranges of at most `max_len` blocks.
    pub fn chunks(&self, max_len: u64) -> Vec<BlockRange> {
        let max_len = max_len.max(1);
        let mut out = Vec::new();
        let mut start = self.from;
        loop {
            let end = start.saturating_add(max_len - 1).min(self.to);
            out.push(BlockRange { from: start, to: end });
            if end == self.to {
                break;
            }
            start = end + 1;
        }
        out
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

// ─── FilterSpec ──────────────────────────────────────────────────────────────

/// Where the `fee` parameter of a `PoolCreated` log lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicLayout {
    /// `fee` is the first word of `data`; three topics.
    #[default]
    FeeInData,
    /// `fee` is indexed as `topics[3]`; four topics, as emitted by the
    /// Uniswap V3 factory.
    FeeIndexed,
}

impl TopicLayout {
    /// Number of topics (signature hash included) a matching log carries.
    pub fn topic_arity(&self) -> usize {
        match self {
            Self::FeeInData => 3,
            Self::FeeIndexed => 4,
        }
    }

    /// Minimum `data` length in bytes.
    pub fn data_len(&self) -> usize {
        match self {
            Self::FeeInData => 96,
            Self::FeeIndexed => 64,
        }
    }
}

/// Which logs to retrieve: one contract, one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub contract_address: Address,
    /// topic[0] of matching logs.
    pub event_signature_hash: B256,
    pub layout: TopicLayout,
}

impl FilterSpec {
    pub fn new(contract_address: Address, event_signature_hash: B256, layout: TopicLayout) -> Self {
        Self {
            contract_address,
            event_signature_hash,
            layout,
        }
    }

    /// Filter for `PoolCreated` emitted by `factory`.
    pub fn pool_created(factory: Address, layout: TopicLayout) -> Self {
        Self::new(factory, keccak256(POOL_CREATED_SIGNATURE), layout)
    }

    pub fn topic_arity(&self) -> usize {
        self.layout.topic_arity()
    }

    /// Returns `true` if `log` was emitted by the contract with the filtered topic0.
    pub fn matches(&self, log: &LogRecord) -> bool {
        log.address == self.contract_address
            && log.topics.first() == Some(&self.event_signature_hash)
    }
}

// ─── LogRecord ───────────────────────────────────────────────────────────────

/// Ordering key of a log on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// A raw event log as delivered by the chain client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Contract that emitted the log.
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
}

impl LogRecord {
    pub fn position(&self) -> LogPosition {
        LogPosition {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }
}

// ─── PoolCreatedEvent ────────────────────────────────────────────────────────

/// A decoded `PoolCreated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCreatedEvent {
    pub token0: Address,
    pub token1: Address,
    /// Fee tier in hundredths of a basis point (`uint24`).
    pub fee: u32,
    /// Signed tick spacing (`int24`).
    pub tick_spacing: i32,
    pub pool: Address,
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
}

impl PoolCreatedEvent {
    pub fn position(&self) -> LogPosition {
        LogPosition {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }
}

impl fmt::Display for PoolCreatedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "New pool created:")?;
        writeln!(f, "Token0: {}", self.token0.to_checksum(None))?;
        writeln!(f, "Token1: {}", self.token1.to_checksum(None))?;
        writeln!(f, "Fee: {}", self.fee)?;
        writeln!(f, "TickSpacing: {}", self.tick_spacing)?;
        writeln!(f, "Pool Address: {}", self.pool.to_checksum(None))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
