//! Subscribe strategy: follows a push feed of logs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use poolscan_core::client::{ChainClient, LogSubscription};
use poolscan_core::error::ScanError;
use poolscan_core::strategy::{LogBatch, RetrievalMode, RetrievalStrategy};
use poolscan_core::types::{BlockRange, FilterSpec, LogRecord};

/// Push retrieval over one long-lived [`LogSubscription`].
///
/// The handle is opened lazily by `next_batch`. When it fails the handle is
/// dropped and the error is reported as [`ScanError::Subscription`]; the next
/// call opens a fresh handle and first fetches `[last_seen, head]` so blocks
/// produced while disconnected are not lost. The first open without a known
/// block starts at the current head.
pub struct SubscribeStrategy<C: ?Sized> {
    client: Arc<C>,
    filter: FilterSpec,
    handle: Option<LogSubscription>,
    last_seen: Option<u64>,
    max_block_range: Option<u64>,
}

impl<C: ChainClient + ?Sized> SubscribeStrategy<C> {
    pub fn new(client: Arc<C>, filter: FilterSpec) -> Self {
        Self {
            client,
            filter,
            handle: None,
            last_seen: None,
            max_block_range: None,
        }
    }

    /// Fetch the reconnect bridge in chunks of at most `blocks` blocks.
    pub fn with_max_block_range(mut self, blocks: Option<u64>) -> Self {
        self.max_block_range = blocks;
        self
    }

    /// Backfill from `block` when the first handle is opened.
    pub fn starting_at(mut self, block: Option<u64>) -> Self {
        self.last_seen = block;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Open a handle. Returns the bridge batch if a gap had to be filled.
    async fn connect(&mut self) -> Result<Option<LogBatch>, ScanError> {
        let handle = self
            .client
            .open_subscription(&self.filter)
            .await
            .map_err(|e| lost("open failed", e))?;
        let head = self
            .client
            .get_head()
            .await
            .map_err(|e| lost("head after open failed", e))?;

        let bridge = match self.last_seen {
            Some(last) => match BlockRange::new(last, head) {
                Some(range) => {
                    let chunks = match self.max_block_range {
                        Some(max) => range.chunks(max),
                        None => vec![range],
                    };
                    let mut logs = Vec::new();
                    for chunk in chunks {
                        logs.extend(
                            self.client
                                .fetch_logs(chunk, &self.filter)
                                .await
                                .map_err(|e| lost("bridge fetch failed", e))?,
                        );
                    }
                    tracing::info!(%range, logs = logs.len(), "bridged subscription gap");
                    Some(LogBatch::for_range(range, logs))
                }
                None => None,
            },
            None => {
                self.last_seen = Some(head);
                None
            }
        };

        tracing::info!(head, "subscription open");
        self.handle = Some(handle);
        Ok(bridge)
    }
}

/// Wrap a failure to (re)establish the feed; configuration errors stay fatal.
fn lost(context: &str, err: ScanError) -> ScanError {
    match err {
        ScanError::Config(_) | ScanError::Subscription(_) => err,
        other => ScanError::Subscription(format!("{context}: {other}")),
    }
}

#[async_trait]
impl<C: ChainClient + ?Sized> RetrievalStrategy for SubscribeStrategy<C> {
    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Subscribe
    }

    async fn next_batch(&mut self) -> Result<LogBatch, ScanError> {
        if self.handle.is_none() {
            if let Some(bridge) = self.connect().await? {
                return Ok(bridge);
            }
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(ScanError::Subscription("no open subscription".into()));
        };

        match handle.next().await {
            Ok(first) => {
                let mut logs = vec![first];
                logs.extend(handle.drain_ready());
                logs.sort_by_key(LogRecord::position);
                Ok(LogBatch::pushed(logs))
            }
            Err(e) => {
                self.handle = None;
                Err(lost("feed ended", e))
            }
        }
    }

    fn commit(&mut self, batch: &LogBatch) -> Result<(), ScanError> {
        if let Some(block) = batch.last_block() {
            self.last_seen = Some(self.last_seen.map_or(block, |seen| seen.max(block)));
        }
        Ok(())
    }

    fn pacing(&self) -> Option<Duration> {
        None
    }

    fn resume_block(&self) -> Option<u64> {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::fixtures::pool_created_log as log;
    use crate::memory::MemoryChain;
    use poolscan_core::config::DEFAULT_FACTORY;
    use poolscan_core::types::TopicLayout;

    fn strategy(chain: Arc<MemoryChain>) -> SubscribeStrategy<MemoryChain> {
        SubscribeStrategy::new(chain, FilterSpec::pool_created(DEFAULT_FACTORY, TopicLayout::FeeInData))
    }

    #[tokio::test]
    async fn first_open_starts_at_head() {
        let chain = Arc::new(MemoryChain::new());
        chain.set_head(100);
        chain.push_log(log(99, 0));
        let mut sub = strategy(chain.clone());

        let waiting = tokio::spawn(async move {
            let batch = sub.next_batch().await.unwrap();
            (sub, batch)
        });
        while !chain.has_live_subscription() {
            tokio::task::yield_now().await;
        }
        chain.emit(log(101, 0));
        chain.emit(log(101, 1));

        let (mut sub, batch) = waiting.await.unwrap();
        assert!(batch.range.is_none());
        assert_eq!(batch.logs.first().map(|l| l.block_number), Some(101));
        sub.commit(&batch).unwrap();
        assert_eq!(sub.resume_block(), Some(101));
        assert!(chain.fetched_ranges().is_empty());
    }

    #[tokio::test]
    async fn reopen_bridges_from_last_seen() {
        let chain = Arc::new(MemoryChain::new());
        chain.set_head(10);
        let mut sub = strategy(chain.clone());
        sub.connect().await.unwrap();

        chain.emit(log(11, 0));
        let batch = sub.next_batch().await.unwrap();
        sub.commit(&batch).unwrap();

        chain.break_subscription(ScanError::Subscription("reset".into()));
        let err = sub.next_batch().await.unwrap_err();
        assert!(err.is_subscription());
        assert!(!sub.is_connected());

        chain.push_log(log(12, 0));
        chain.set_head(13);
        let bridge = sub.next_batch().await.unwrap();
        assert_eq!(bridge.range, Some(BlockRange { from: 11, to: 13 }));
        let blocks: Vec<_> = bridge.logs.iter().map(|l| l.block_number).collect();
        assert_eq!(blocks, vec![11, 12]);
        sub.commit(&bridge).unwrap();
        assert_eq!(sub.resume_block(), Some(13));
        assert_eq!(chain.subscriptions_opened(), 2);
    }

    #[tokio::test]
    async fn bridge_fetch_is_chunked() {
        let chain = Arc::new(MemoryChain::new());
        chain.set_head(30);
        chain.push_log(log(12, 0));
        chain.push_log(log(27, 1));
        let mut sub = strategy(chain.clone())
            .starting_at(Some(10))
            .with_max_block_range(Some(5));

        let bridge = sub.next_batch().await.unwrap();
        assert_eq!(bridge.range, Some(BlockRange { from: 10, to: 30 }));
        assert_eq!(
            chain.fetched_ranges(),
            vec![
                BlockRange { from: 10, to: 14 },
                BlockRange { from: 15, to: 19 },
                BlockRange { from: 20, to: 24 },
                BlockRange { from: 25, to: 29 },
                BlockRange { from: 30, to: 30 },
            ]
        );
        let blocks: Vec<_> = bridge.logs.iter().map(|l| l.block_number).collect();
        assert_eq!(blocks, vec![12, 27]);
        assert!(sub.is_connected());
    }

    #[tokio::test]
    async fn open_failure_is_subscription_error() {
        let chain = Arc::new(MemoryChain::new());
        chain.fail_next_open(ScanError::rpc("refused"));
        let mut sub = strategy(chain);
        let err = sub.next_batch().await.unwrap_err();
        assert!(err.is_subscription());
        assert!(!sub.is_connected());
    }

    #[tokio::test]
    async fn queued_logs_precede_error() {
        let chain = Arc::new(MemoryChain::new());
        let mut sub = strategy(chain.clone());
        sub.connect().await.unwrap();
        chain.emit(log(1, 0));
        chain.emit(log(2, 0));
        chain.break_subscription(ScanError::Subscription("gone".into()));

        let batch = sub.next_batch().await.unwrap();
        assert_eq!(batch.logs.len(), 2);
        assert!(sub.next_batch().await.unwrap_err().is_subscription());
    }
}
