//! poolscan CLI: watch a Uniswap V3 style factory for new pools.
//!
//! # Commands
//! ```text
//! poolscan run    [--config FILE] [--rpc-url URL] [--ws-url URL] [--mode poll|subscribe] ...
//! poolscan decode --topics <t0> <t1> <t2> [t3] --data <hex> [--fee-indexed]
//! poolscan info   [--config FILE] ...
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;

use poolscan_core::config::ScannerConfig;
use poolscan_core::decoder::PoolCreatedDecoder;
use poolscan_core::strategy::RetrievalMode;
use poolscan_core::types::{LogRecord, TopicLayout};
use poolscan_evm::{RpcChainClient, Scanner};
use poolscan_rpc::{HttpClientConfig, HttpRpcClient};

mod logging;
mod sink;

use logging::LogConfig;
use sink::{OutputFormat, StdoutSink};

#[derive(Parser)]
#[command(
    name = "poolscan",
    about = "Watch a factory contract for PoolCreated events",
    long_about = "
poolscan: print every new pool created by a Uniswap V3 style factory.
Polls eth_getLogs on an interval or follows an eth_subscribe feed.

ENVIRONMENT VARIABLES:
  POOLSCAN_CONFIG       Path to a TOML config file
  POOLSCAN_RPC_URL      HTTP JSON-RPC endpoint
  POOLSCAN_WS_URL       WebSocket endpoint (subscribe mode)
  POOLSCAN_MODE         poll | subscribe
  POOLSCAN_CONTRACT     Factory contract address
  POOLSCAN_FROM_BLOCK   Backfill from this block
  POOLSCAN_MAX_BLOCK_RANGE  Widest block range per eth_getLogs call
  POOLSCAN_FEE_INDEXED  Fee is topics[3] (true | false)
  POOLSCAN_OUTPUT       Event output: text | json
  POOLSCAN_LOG_LEVEL    Log filter (e.g. info, poolscan_evm=debug)
  POOLSCAN_LOG_COMPONENTS  Per-crate levels (e.g. poolscan-rpc=debug,poolscan-evm=trace)
  POOLSCAN_JSON_LOGS    Emit logs as JSON
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan until Ctrl-C
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Event output format on stdout
        #[arg(long, value_enum, env = "POOLSCAN_OUTPUT", default_value_t = OutputFormat::Text)]
        output: OutputFormat,
        /// Log level / filter directives
        #[arg(long, env = "POOLSCAN_LOG_LEVEL", default_value = "info")]
        log_level: String,
        /// Per-crate level override, e.g. poolscan-rpc=debug (repeatable)
        #[arg(
            long = "log-component",
            value_name = "CRATE=LEVEL",
            env = "POOLSCAN_LOG_COMPONENTS",
            value_delimiter = ',',
            value_parser = logging::parse_component
        )]
        log_components: Vec<(String, String)>,
        /// Emit logs as JSON
        #[arg(long, env = "POOLSCAN_JSON_LOGS")]
        json_logs: bool,
    },

    /// Decode one PoolCreated log offline
    Decode {
        /// topics[0] = event signature hash, then token0, token1 (and fee if indexed)
        #[arg(long, num_args = 1..)]
        topics: Vec<String>,
        /// Non-indexed params (hex, 0x-prefixed)
        #[arg(long, default_value = "0x")]
        data: String,
        /// The fee is topics[3] rather than the first data word
        #[arg(long)]
        fee_indexed: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Info {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// Config file plus command-line / environment overrides.
#[derive(Args)]
struct ConfigArgs {
    /// TOML config file
    #[arg(long, env = "POOLSCAN_CONFIG")]
    config: Option<PathBuf>,
    /// HTTP JSON-RPC endpoint
    #[arg(long, env = "POOLSCAN_RPC_URL")]
    rpc_url: Option<String>,
    /// WebSocket endpoint used by subscribe mode
    #[arg(long, env = "POOLSCAN_WS_URL")]
    ws_url: Option<String>,
    /// Retrieval mode: poll | subscribe
    #[arg(long, env = "POOLSCAN_MODE")]
    mode: Option<RetrievalMode>,
    /// Factory contract address
    #[arg(long, env = "POOLSCAN_CONTRACT")]
    contract: Option<Address>,
    /// Backfill from this block instead of starting at the head
    #[arg(long, env = "POOLSCAN_FROM_BLOCK")]
    from_block: Option<u64>,
    /// Widest block range per eth_getLogs call
    #[arg(long, env = "POOLSCAN_MAX_BLOCK_RANGE")]
    max_block_range: Option<u64>,
    /// Fee is an indexed topic (Uniswap V3 factory layout)
    #[arg(long, env = "POOLSCAN_FEE_INDEXED")]
    fee_indexed: bool,
}

impl ConfigArgs {
    /// File (or defaults), then overrides.
    fn resolve(&self) -> Result<ScannerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ScannerConfig::default(),
        };
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(url) = &self.ws_url {
            config.ws_url = Some(url.clone());
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(contract) = self.contract {
            config.contract_address = contract;
        }
        if let Some(block) = self.from_block {
            config.start_block = Some(block);
        }
        if let Some(blocks) = self.max_block_range {
            config.max_block_range = Some(blocks);
        }
        if self.fee_indexed {
            config.layout = TopicLayout::FeeIndexed;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<ScannerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config file '{}'", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parse config file '{}'", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output,
            log_level,
            log_components,
            json_logs,
        } => {
            logging::init_tracing(&LogConfig {
                level: log_level,
                components: log_components.into_iter().collect(),
                json: json_logs,
            });
            cmd_run(config.resolve()?, output).await
        }

        Commands::Decode { topics, data, fee_indexed, json } => {
            cmd_decode(&topics, &data, fee_indexed, json)
        }

        Commands::Info { config } => cmd_info(&config.resolve()?),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_run(config: ScannerConfig, output: OutputFormat) -> Result<()> {
    let transport = HttpRpcClient::new(
        config.rpc_url.clone(),
        HttpClientConfig {
            request_timeout: config.request_timeout(),
        },
    )
    .context("create HTTP client")?;
    let mut client = RpcChainClient::new(transport, config.request_timeout());
    if let Some(ws_url) = &config.ws_url {
        client = client.with_ws_url(ws_url.clone());
    }

    let mut scanner = Scanner::new(config, Arc::new(client), Arc::new(StdoutSink::new(output)))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = scanner.run(shutdown_rx).await.context("scan failed")?;
    tracing::info!(
        batches = summary.batches,
        events = summary.events,
        decode_failures = summary.decode_failures,
        retries = summary.retries,
        reconnects = summary.reconnects,
        fell_back = summary.fell_back,
        "run summary"
    );
    Ok(())
}

fn cmd_decode(topics: &[String], data: &str, fee_indexed: bool, as_json: bool) -> Result<()> {
    let topics = topics
        .iter()
        .map(|t| t.parse::<B256>().with_context(|| format!("invalid topic '{t}'")))
        .collect::<Result<Vec<_>>>()?;
    let data = hex::decode(data.strip_prefix("0x").unwrap_or(data)).context("invalid data hex")?;

    let log = LogRecord {
        address: Address::ZERO,
        topics,
        data: Bytes::from(data),
        block_number: 0,
        transaction_hash: B256::ZERO,
        log_index: 0,
    };
    let layout = if fee_indexed {
        TopicLayout::FeeIndexed
    } else {
        TopicLayout::FeeInData
    };
    let event = PoolCreatedDecoder::new(layout).decode(&log)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&event)?);
    } else {
        println!("{event}");
    }
    Ok(())
}

fn cmd_info(config: &ScannerConfig) -> Result<()> {
    println!("poolscan v{}", env!("CARGO_PKG_VERSION"));
    println!("# topic0 = {}", config.signature_hash());
    println!("{}", toml::to_string_pretty(config).context("render config")?);
    Ok(())
}
