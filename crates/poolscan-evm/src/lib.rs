//! poolscan-evm: EVM chain client, retrieval strategies and scan loop.

pub mod builder;
pub mod client;
pub mod memory;
pub mod poll;
pub mod scanner;
pub mod subscribe;

pub use builder::ScannerBuilder;
pub use client::RpcChainClient;
pub use memory::MemoryChain;
pub use poll::PollStrategy;
pub use scanner::{RunSummary, Scanner};
pub use subscribe::SubscribeStrategy;
