//! End-to-end scan loop behaviour against an in-memory chain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use poolscan_core::client::ChainClient;
use poolscan_core::config::{ScannerConfig, ScannerState};
use poolscan_core::error::ScanError;
use poolscan_core::sink::{EventSink, MemorySink};
use poolscan_core::strategy::RetrievalMode;
use poolscan_core::types::{BlockRange, PoolCreatedEvent};
use poolscan_evm::memory::fixtures::{malformed_log, pool_created_log};
use poolscan_evm::{MemoryChain, RunSummary, Scanner};

type Running = JoinHandle<(Scanner, Result<RunSummary, ScanError>)>;

fn poll_config() -> ScannerConfig {
    ScannerConfig {
        poll_interval_ms: 1_000,
        retry_delay_ms: 200,
        ..Default::default()
    }
}

fn subscribe_config() -> ScannerConfig {
    ScannerConfig {
        mode: RetrievalMode::Subscribe,
        ws_url: Some("ws://memory".into()),
        ..poll_config()
    }
}

fn start(
    config: ScannerConfig,
    chain: &Arc<MemoryChain>,
    sink: Arc<dyn EventSink>,
) -> (watch::Sender<bool>, Running) {
    let client: Arc<dyn ChainClient> = chain.clone();
    let mut scanner = Scanner::new(config, client, sink).unwrap();
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let result = scanner.run(rx).await;
        (scanner, result)
    });
    (tx, handle)
}

async fn stop(tx: watch::Sender<bool>, handle: Running) -> (Scanner, RunSummary) {
    tx.send(true).unwrap();
    let (scanner, result) = handle.await.unwrap();
    (scanner, result.unwrap())
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn positions(events: &[PoolCreatedEvent]) -> Vec<String> {
    events.iter().map(|e| e.position().to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn poll_scans_gapless_ranges_and_skips_bad_logs() {
    let chain = Arc::new(MemoryChain::new());
    let sink = Arc::new(MemorySink::new());
    chain.set_head(100);
    chain.push_log(pool_created_log(99, 0));
    chain.push_log(pool_created_log(100, 0));

    let (tx, handle) = start(poll_config(), &chain, sink.clone());
    wait_until(|| sink.len() == 1).await;

    chain.push_log(pool_created_log(103, 0));
    chain.push_log(malformed_log(103, 1));
    chain.push_log(pool_created_log(104, 2));
    chain.set_head(105);
    wait_until(|| sink.len() == 3).await;

    let (scanner, summary) = stop(tx, handle).await;
    assert_eq!(
        chain.fetched_ranges(),
        vec![BlockRange { from: 100, to: 100 }, BlockRange { from: 101, to: 105 }]
    );
    assert_eq!(positions(&sink.events()), vec!["100:0", "103:0", "104:2"]);
    assert_eq!(summary.decode_failures, 1);
    assert_eq!(summary.events, 3);
    assert_eq!(scanner.state(), ScannerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_retries_the_same_range() {
    let chain = Arc::new(MemoryChain::new());
    let sink = Arc::new(MemorySink::new());
    chain.set_head(100);
    chain.push_log(pool_created_log(100, 0));
    chain.fail_next_fetch(ScanError::rpc("query timeout"));
    chain.fail_next_head(ScanError::Network("connection reset".into()));

    let (tx, handle) = start(poll_config(), &chain, sink.clone());
    wait_until(|| sink.len() == 1).await;

    let (_, summary) = stop(tx, handle).await;
    assert_eq!(
        chain.fetched_ranges(),
        vec![BlockRange { from: 100, to: 100 }, BlockRange { from: 100, to: 100 }]
    );
    assert_eq!(summary.retries, 2);
    assert_eq!(positions(&sink.events()), vec!["100:0"]);
}

#[tokio::test(start_paused = true)]
async fn poll_and_subscribe_emit_identical_events() {
    let logs = [
        pool_created_log(10, 0),
        pool_created_log(10, 4),
        malformed_log(11, 0),
        pool_created_log(12, 1),
    ];

    // Poll: all logs are on chain, scan starts at block 10.
    let polled_chain = Arc::new(MemoryChain::new());
    let polled = Arc::new(MemorySink::new());
    for log in &logs {
        polled_chain.push_log(log.clone());
    }
    polled_chain.set_head(12);
    let config = ScannerConfig {
        start_block: Some(10),
        ..poll_config()
    };
    let (tx, handle) = start(config, &polled_chain, polled.clone());
    wait_until(|| polled.len() == 3).await;
    stop(tx, handle).await;

    // Subscribe: the same logs arrive on the live feed.
    let pushed_chain = Arc::new(MemoryChain::new());
    let pushed = Arc::new(MemorySink::new());
    pushed_chain.set_head(9);
    let (tx, handle) = start(subscribe_config(), &pushed_chain, pushed.clone());
    wait_until(|| pushed_chain.has_live_subscription()).await;
    for log in &logs {
        pushed_chain.emit(log.clone());
    }
    wait_until(|| pushed.len() == 3).await;
    let (_, summary) = stop(tx, handle).await;

    assert_eq!(polled.events(), pushed.events());
    assert_eq!(summary.decode_failures, 1);
    assert_eq!(summary.duplicates, 0);
}

#[tokio::test(start_paused = true)]
async fn reconnect_bridge_does_not_duplicate() {
    let chain = Arc::new(MemoryChain::new());
    let sink = Arc::new(MemorySink::new());
    chain.set_head(10);

    let (tx, handle) = start(subscribe_config(), &chain, sink.clone());
    wait_until(|| chain.has_live_subscription()).await;
    chain.emit(pool_created_log(11, 0));
    wait_until(|| sink.len() == 1).await;

    // Block 12 is produced while the feed is down.
    chain.break_subscription(ScanError::Subscription("connection reset".into()));
    chain.push_log(pool_created_log(12, 0));
    chain.set_head(12);
    wait_until(|| chain.subscriptions_opened() == 2 && chain.has_live_subscription()).await;
    wait_until(|| sink.len() == 2).await;

    chain.emit(pool_created_log(13, 0));
    wait_until(|| sink.len() == 3).await;

    let (scanner, summary) = stop(tx, handle).await;
    assert_eq!(chain.fetched_ranges(), vec![BlockRange { from: 11, to: 12 }]);
    assert_eq!(positions(&sink.events()), vec!["11:0", "12:0", "13:0"]);
    assert_eq!(summary.reconnects, 1);
    assert_eq!(summary.duplicates, 1);
    assert!(!summary.fell_back);
    assert_eq!(scanner.mode(), RetrievalMode::Subscribe);
}

#[tokio::test(start_paused = true)]
async fn subscribe_backfill_respects_max_block_range() {
    let chain = Arc::new(MemoryChain::new());
    let sink = Arc::new(MemorySink::new());
    chain.set_head(30);
    chain.push_log(pool_created_log(12, 0));
    chain.push_log(pool_created_log(29, 0));
    let config = ScannerConfig {
        start_block: Some(10),
        max_block_range: Some(5),
        ..subscribe_config()
    };

    let (tx, handle) = start(config, &chain, sink.clone());
    wait_until(|| sink.len() == 2 && chain.has_live_subscription()).await;

    let (_, summary) = stop(tx, handle).await;
    let fetched = chain.fetched_ranges();
    assert_eq!(fetched.first(), Some(&BlockRange { from: 10, to: 14 }));
    assert_eq!(fetched.last(), Some(&BlockRange { from: 30, to: 30 }));
    assert!(fetched.iter().all(|r| r.to - r.from < 5));
    assert_eq!(positions(&sink.events()), vec!["12:0", "29:0"]);
    assert_eq!(chain.subscriptions_opened(), 1);
    assert_eq!(summary.reconnects, 0);
    assert!(!summary.fell_back);
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnects_fall_back_to_polling() {
    let chain = Arc::new(MemoryChain::new());
    let sink = Arc::new(MemorySink::new());
    chain.set_head(10);
    let config = ScannerConfig {
        max_reconnects: 2,
        ..subscribe_config()
    };

    let (tx, handle) = start(config, &chain, sink.clone());
    wait_until(|| chain.has_live_subscription()).await;
    chain.emit(pool_created_log(11, 0));
    wait_until(|| sink.len() == 1).await;

    chain.fail_next_open(ScanError::Network("refused".into()));
    chain.fail_next_open(ScanError::Network("refused".into()));
    chain.push_log(pool_created_log(12, 0));
    chain.set_head(12);
    chain.break_subscription(ScanError::Subscription("connection reset".into()));
    wait_until(|| sink.len() == 2).await;

    let (scanner, summary) = stop(tx, handle).await;
    assert!(summary.fell_back);
    assert_eq!(summary.reconnects, 2);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(scanner.mode(), RetrievalMode::Poll);
    assert_eq!(chain.fetched_ranges().first(), Some(&BlockRange { from: 11, to: 12 }));
    assert_eq!(positions(&sink.events()), vec!["11:0", "12:0"]);
}

#[tokio::test(start_paused = true)]
async fn subscription_failure_is_fatal_without_fallback() {
    let chain = Arc::new(MemoryChain::new());
    let sink = Arc::new(MemorySink::new());
    let config = ScannerConfig {
        max_reconnects: 0,
        fallback_to_poll: false,
        ..subscribe_config()
    };

    let (_tx, handle) = start(config, &chain, sink);
    wait_until(|| chain.has_live_subscription()).await;
    chain.break_subscription(ScanError::Subscription("closed by server".into()));

    let (scanner, result) = handle.await.unwrap();
    assert!(result.unwrap_err().is_subscription());
    assert_eq!(scanner.state(), ScannerState::Failed);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_poll_sleep() {
    let chain = Arc::new(MemoryChain::new());
    chain.set_head(5);
    let config = ScannerConfig {
        poll_interval_ms: 3_600_000,
        ..poll_config()
    };

    let (tx, handle) = start(config, &chain, Arc::new(MemorySink::new()));
    wait_until(|| !chain.fetched_ranges().is_empty()).await;
    tx.send(true).unwrap();

    let (scanner, result) = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scanner ignored shutdown")
        .unwrap();
    assert_eq!(result.unwrap().batches, 1);
    assert_eq!(scanner.state(), ScannerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_subscription_wait() {
    let chain = Arc::new(MemoryChain::new());
    let (tx, handle) = start(subscribe_config(), &chain, Arc::new(MemorySink::new()));
    wait_until(|| chain.has_live_subscription()).await;
    tx.send(true).unwrap();

    let (_, result) = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scanner ignored shutdown")
        .unwrap();
    assert_eq!(result.unwrap().events, 0);
    assert!(!chain.has_live_subscription());
}

struct BrokenSink;

#[async_trait]
impl EventSink for BrokenSink {
    async fn emit(&self, _event: &PoolCreatedEvent) -> Result<(), ScanError> {
        Err(ScanError::Other("stdout closed".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn sink_failure_is_fatal() {
    let chain = Arc::new(MemoryChain::new());
    chain.set_head(7);
    chain.push_log(pool_created_log(7, 0));

    let (_tx, handle) = start(poll_config(), &chain, Arc::new(BrokenSink));
    let (scanner, result) = handle.await.unwrap();
    assert!(matches!(result, Err(ScanError::Sink(_))));
    assert_eq!(scanner.state(), ScannerState::Failed);
}
