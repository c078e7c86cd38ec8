//! Retrieval strategy trait: one contract for pull and push retrieval.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::types::{BlockRange, LogRecord};

/// How logs are retrieved from the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Re-scan a moving block range on an interval.
    #[default]
    Poll,
    /// Follow a long-lived push feed.
    Subscribe,
}

impl std::fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poll => write!(f, "poll"),
            Self::Subscribe => write!(f, "subscribe"),
        }
    }
}

impl std::str::FromStr for RetrievalMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "subscribe" | "ws" => Ok(Self::Subscribe),
            other => Err(ScanError::Config(format!("unknown retrieval mode '{other}'"))),
        }
    }
}

/// An ordered group of raw logs handed to the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBatch {
    /// Block range the batch fully covers (poll batches only).
    pub range: Option<BlockRange>,
    pub logs: Vec<LogRecord>,
}

impl LogBatch {
    pub fn for_range(range: BlockRange, logs: Vec<LogRecord>) -> Self {
        Self {
            range: Some(range),
            logs,
        }
    }

    pub fn pushed(logs: Vec<LogRecord>) -> Self {
        Self { range: None, logs }
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Highest block number the batch covers.
    pub fn last_block(&self) -> Option<u64> {
        let from_logs = self.logs.iter().map(|l| l.block_number).max();
        match (self.range.map(|r| r.to), from_logs) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// A source of ordered log batches.
///
/// The scheduler calls [`next_batch`](RetrievalStrategy::next_batch), decodes
/// and emits the logs, then calls [`commit`](RetrievalStrategy::commit).
/// `next_batch` must leave the strategy unchanged if its future is dropped,
/// so a shutdown can interrupt it at any await point.
#[async_trait]
pub trait RetrievalStrategy: Send {
    fn mode(&self) -> RetrievalMode;

    /// Wait for the next batch of logs.
    async fn next_batch(&mut self) -> Result<LogBatch, ScanError>;

    /// Record that every log of `batch` was processed.
    fn commit(&mut self, batch: &LogBatch) -> Result<(), ScanError>;

    /// Pause before asking for the next batch after a commit.
    fn pacing(&self) -> Option<Duration>;

    /// Last block this strategy has fully delivered.
    fn resume_block(&self) -> Option<u64>;
}
