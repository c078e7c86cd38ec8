//! The chain client facade: the only way the pipeline talks to a node.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::ScanError;
use crate::types::{BlockRange, FilterSpec, LogRecord};

/// Capability surface over a remote node.
///
/// Implementations bound every call by their own per-call timeout and
/// report it as [`ScanError::Network`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current chain height.
    async fn get_head(&self) -> Result<u64, ScanError>;

    /// All logs matching `filter` in `range`, ordered by (block, log index).
    async fn fetch_logs(
        &self,
        range: BlockRange,
        filter: &FilterSpec,
    ) -> Result<Vec<LogRecord>, ScanError>;

    /// Open a push feed of matching logs.
    async fn open_subscription(&self, filter: &FilterSpec) -> Result<LogSubscription, ScanError>;
}

/// A live log feed: an event stream plus a side channel for failures.
///
/// Dropping the handle aborts the background tasks that feed it.
#[derive(Debug)]
pub struct LogSubscription {
    pub logs: mpsc::UnboundedReceiver<LogRecord>,
    pub errors: mpsc::UnboundedReceiver<ScanError>,
    tasks: Vec<AbortHandle>,
}

impl LogSubscription {
    pub fn new(
        logs: mpsc::UnboundedReceiver<LogRecord>,
        errors: mpsc::UnboundedReceiver<ScanError>,
    ) -> Self {
        Self {
            logs,
            errors,
            tasks: Vec::new(),
        }
    }

    /// Tie a background task's lifetime to this handle.
    pub fn with_task(mut self, task: AbortHandle) -> Self {
        self.tasks.push(task);
        self
    }

    /// Wait for the next item: a log, or the error that ended the feed.
    ///
    /// Queued logs are returned before a queued error. A feed whose channels
    /// both closed reports a subscription error.
    pub async fn next(&mut self) -> Result<LogRecord, ScanError> {
        tokio::select! {
            biased;
            Some(log) = self.logs.recv() => Ok(log),
            Some(err) = self.errors.recv() => Err(err),
            else => Err(ScanError::Subscription("subscription channels closed".into())),
        }
    }

    /// Logs already queued, without waiting.
    pub fn drain_ready(&mut self) -> Vec<LogRecord> {
        let mut out = Vec::new();
        while let Ok(log) = self.logs.try_recv() {
            out.push(log);
        }
        out
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
