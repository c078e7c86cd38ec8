//! The scan loop: drives a retrieval strategy into the sink.
//!
//! # Loop
//! 1. Wait for the next batch (interruptible by shutdown)
//! 2. Drop logs at or before the last processed position
//! 3. Decode; undecodable logs are logged and skipped
//! 4. Emit events in order, then commit the batch
//! 5. Sleep the strategy's pacing interval (poll only)
//!
//! # Failures
//! - Network / RPC: sleep `retry_delay`, retry the same batch
//! - Subscription: reconnect with exponential backoff; once the budget is
//!   spent, fall back to polling from the last delivered block, or fail
//! - Sink, configuration, cursor: fatal

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use poolscan_core::backoff::Backoff;
use poolscan_core::client::ChainClient;
use poolscan_core::config::{ScannerConfig, ScannerState};
use poolscan_core::cursor::Cursor;
use poolscan_core::decoder::PoolCreatedDecoder;
use poolscan_core::error::ScanError;
use poolscan_core::sink::EventSink;
use poolscan_core::strategy::{LogBatch, RetrievalMode, RetrievalStrategy};
use poolscan_core::types::LogPosition;

use crate::poll::PollStrategy;
use crate::subscribe::SubscribeStrategy;

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub batches: u64,
    pub events: u64,
    pub decode_failures: u64,
    pub duplicates: u64,
    pub retries: u64,
    pub reconnects: u64,
    /// `true` once the scanner switched from subscribe to poll.
    pub fell_back: bool,
    pub last_position: Option<LogPosition>,
}

/// Scans one contract for `PoolCreated` events.
pub struct Scanner {
    config: ScannerConfig,
    client: Arc<dyn ChainClient>,
    sink: Arc<dyn EventSink>,
    decoder: PoolCreatedDecoder,
    strategy: Box<dyn RetrievalStrategy>,
    state: ScannerState,
    summary: RunSummary,
}

impl Scanner {
    /// Validate `config` and build the strategy for its mode.
    pub fn new(
        config: ScannerConfig,
        client: Arc<dyn ChainClient>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ScanError> {
        config.validate()?;
        let strategy: Box<dyn RetrievalStrategy> = match config.mode {
            RetrievalMode::Poll => Box::new(poll_strategy(&config, client.clone(), initial_cursor(&config))),
            RetrievalMode::Subscribe => Box::new(
                SubscribeStrategy::new(client.clone(), config.filter())
                    .starting_at(config.start_block)
                    .with_max_block_range(config.max_block_range),
            ),
        };
        Ok(Self {
            decoder: PoolCreatedDecoder::new(config.layout),
            config,
            client,
            sink,
            strategy,
            state: ScannerState::Idle,
            summary: RunSummary::default(),
        })
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    /// Mode of the strategy currently in use.
    pub fn mode(&self) -> RetrievalMode {
        self.strategy.mode()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Run until `shutdown` turns `true` or a fatal error occurs.
    ///
    /// A dropped shutdown sender never stops the loop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary, ScanError> {
        let backoff = Backoff::new(self.config.backoff());
        let mut reconnect_attempt = 0u32;
        self.state = self.active_state();

        tracing::info!(
            mode = %self.strategy.mode(),
            contract = %self.config.contract_address,
            topic0 = %self.config.signature_hash(),
            "scanner started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                next = self.strategy.next_batch() => next,
            };

            match next {
                Ok(batch) => {
                    reconnect_attempt = 0;
                    self.state = self.active_state();
                    if let Err(e) = self.process(batch).await {
                        return Err(self.fail(e));
                    }
                    if let Some(pause) = self.strategy.pacing() {
                        if sleep_or_shutdown(pause, &mut shutdown).await {
                            break;
                        }
                    }
                }
                Err(e) if e.is_transient() => {
                    self.summary.retries += 1;
                    self.state = ScannerState::Backoff;
                    tracing::warn!(
                        error = %e,
                        delay_ms = self.config.retry_delay_ms,
                        "retrieval failed, retrying"
                    );
                    if sleep_or_shutdown(self.config.retry_delay(), &mut shutdown).await {
                        break;
                    }
                }
                Err(e) if e.is_subscription() => {
                    reconnect_attempt += 1;
                    match backoff.delay(reconnect_attempt) {
                        Some(delay) => {
                            self.summary.reconnects += 1;
                            self.state = ScannerState::Backoff;
                            tracing::warn!(
                                error = %e,
                                attempt = reconnect_attempt,
                                max = backoff.config.max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                "subscription lost, reconnecting"
                            );
                            if sleep_or_shutdown(delay, &mut shutdown).await {
                                break;
                            }
                        }
                        None if self.config.fallback_to_poll => {
                            tracing::warn!(error = %e, "reconnect budget spent");
                            self.fall_back_to_poll();
                            reconnect_attempt = 0;
                        }
                        None => return Err(self.fail(e)),
                    }
                }
                Err(e) => return Err(self.fail(e)),
            }
        }

        self.state = ScannerState::Stopped;
        tracing::info!(
            batches = self.summary.batches,
            events = self.summary.events,
            decode_failures = self.summary.decode_failures,
            "scanner stopped"
        );
        Ok(self.summary.clone())
    }

    /// Dedup, decode, emit, commit.
    async fn process(&mut self, batch: LogBatch) -> Result<(), ScanError> {
        let mut fresh = Vec::with_capacity(batch.logs.len());
        for log in &batch.logs {
            let position = log.position();
            if self.summary.last_position.is_some_and(|last| position <= last) {
                self.summary.duplicates += 1;
                continue;
            }
            self.summary.last_position = Some(position);
            fresh.push(log);
        }

        let decoded = self.decoder.decode_all(fresh);
        for (position, err) in &decoded.failures {
            tracing::warn!(%position, error = %err, "skipping undecodable log");
        }
        self.summary.decode_failures += decoded.failures.len() as u64;

        for event in &decoded.events {
            self.sink.emit(event).await.map_err(|e| match e {
                ScanError::Sink(_) => e,
                other => ScanError::Sink(other.to_string()),
            })?;
            self.summary.events += 1;
        }

        self.strategy.commit(&batch)?;
        self.summary.batches += 1;

        if let Some(range) = batch.range {
            tracing::debug!(%range, events = decoded.events.len(), "batch committed");
        } else if !decoded.events.is_empty() {
            tracing::debug!(events = decoded.events.len(), "pushed batch committed");
        }
        Ok(())
    }

    fn fall_back_to_poll(&mut self) {
        let cursor = match self.strategy.resume_block() {
            // Re-scan the last delivered block; dedup drops what was seen.
            Some(block) => Cursor::resume_after(block.saturating_sub(1)),
            None => initial_cursor(&self.config),
        };
        tracing::warn!(
            from = cursor.last_processed().map(|b| b + 1),
            "falling back to polling"
        );
        self.strategy = Box::new(poll_strategy(&self.config, self.client.clone(), cursor));
        self.summary.fell_back = true;
        self.state = ScannerState::Polling;
    }

    fn fail(&mut self, e: ScanError) -> ScanError {
        self.state = ScannerState::Failed;
        tracing::error!(error = %e, "scanner failed");
        e
    }

    fn active_state(&self) -> ScannerState {
        match self.strategy.mode() {
            RetrievalMode::Poll => ScannerState::Polling,
            RetrievalMode::Subscribe => ScannerState::Subscribed,
        }
    }
}

fn poll_strategy(
    config: &ScannerConfig,
    client: Arc<dyn ChainClient>,
    cursor: Cursor,
) -> PollStrategy<dyn ChainClient> {
    PollStrategy::new(client, config.filter(), cursor, config.poll_interval())
        .with_max_block_range(config.max_block_range)
}

/// An explicit start block backfills from it; otherwise start at the head.
fn initial_cursor(config: &ScannerConfig) -> Cursor {
    match config.start_block {
        Some(block) => Cursor::resume_after(block.saturating_sub(1)),
        None => Cursor::new(),
    }
}

/// Resolves once shutdown is requested; never if the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Returns `true` if shutdown was requested before `duration` elapsed.
async fn sleep_or_shutdown(duration: Duration, rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_requested(rx) => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
