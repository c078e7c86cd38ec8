//! Poll strategy: re-scans a moving block range on an interval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use poolscan_core::client::ChainClient;
use poolscan_core::cursor::Cursor;
use poolscan_core::error::ScanError;
use poolscan_core::strategy::{LogBatch, RetrievalMode, RetrievalStrategy};
use poolscan_core::types::FilterSpec;

/// Pull retrieval driven by a [`Cursor`].
///
/// Each batch covers `[last_processed + 1, head]`. The cursor moves only in
/// [`commit`](RetrievalStrategy::commit), so a failed or abandoned fetch
/// yields the same range on the next attempt.
pub struct PollStrategy<C: ?Sized> {
    client: Arc<C>,
    filter: FilterSpec,
    cursor: Cursor,
    max_block_range: Option<u64>,
    poll_interval: Duration,
}

impl<C: ChainClient + ?Sized> PollStrategy<C> {
    pub fn new(client: Arc<C>, filter: FilterSpec, cursor: Cursor, poll_interval: Duration) -> Self {
        Self {
            client,
            filter,
            cursor,
            max_block_range: None,
            poll_interval,
        }
    }

    /// Fetch wide ranges in chunks of at most `blocks` blocks.
    pub fn with_max_block_range(mut self, blocks: Option<u64>) -> Self {
        self.max_block_range = blocks;
        self
    }
}

#[async_trait]
impl<C: ChainClient + ?Sized> RetrievalStrategy for PollStrategy<C> {
    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Poll
    }

    async fn next_batch(&mut self) -> Result<LogBatch, ScanError> {
        let head = self.client.get_head().await?;

        // Seeding an uninitialized cursor is the only mutation outside commit;
        // it is idempotent for the same head.
        let Some(range) = self.cursor.next_range(head) else {
            tracing::debug!(head, "no new blocks");
            return Ok(LogBatch::default());
        };

        let chunks = match self.max_block_range {
            Some(max) => range.chunks(max),
            None => vec![range],
        };
        let mut logs = Vec::new();
        for chunk in chunks {
            logs.extend(self.client.fetch_logs(chunk, &self.filter).await?);
        }

        tracing::debug!(%range, head, logs = logs.len(), "range fetched");
        Ok(LogBatch::for_range(range, logs))
    }

    fn commit(&mut self, batch: &LogBatch) -> Result<(), ScanError> {
        match batch.range {
            Some(range) => self.cursor.advance(range.to),
            None => Ok(()),
        }
    }

    fn pacing(&self) -> Option<Duration> {
        Some(self.poll_interval)
    }

    fn resume_block(&self) -> Option<u64> {
        self.cursor.last_processed()
    }
}
