//! poolscan-core: types, cursor and decoder for the pool creation scanner.
//!
//! # Architecture
//!
//! ```text
//! Scanner → RetrievalStrategy (Poll | Subscribe)
//!               ├── Cursor              (gapless range math, poll only)
//!               └── ChainClient         (head, range logs, push feed)
//!         → PoolCreatedDecoder          (topics + ABI words → PoolCreatedEvent)
//!         → EventSink
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod sink;
pub mod strategy;
pub mod types;

pub use backoff::{Backoff, BackoffConfig};
pub use client::{ChainClient, LogSubscription};
pub use config::{ScannerConfig, ScannerState};
pub use cursor::Cursor;
pub use decoder::{DecodedBatch, PoolCreatedDecoder};
pub use error::{DecodeError, ScanError};
pub use sink::{EventSink, MemorySink};
pub use strategy::{LogBatch, RetrievalMode, RetrievalStrategy};
pub use types::{
    BlockRange, FilterSpec, LogPosition, LogRecord, PoolCreatedEvent, TopicLayout,
    POOL_CREATED_SIGNATURE,
};
