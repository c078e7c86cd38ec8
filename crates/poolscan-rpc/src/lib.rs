//! poolscan-rpc: JSON-RPC transport for the pool creation scanner.
//!
//! - [`RpcTransport`]: async request/response trait, implemented by
//!   [`HttpRpcClient`]
//! - [`ws::subscribe`]: `eth_subscribe` over WebSocket with a push channel
//! - [`RawLog`] / [`LogFilterParams`]: log wire types

pub mod error;
pub mod http;
pub mod log;
pub mod request;
pub mod transport;
pub mod ws;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use log::{parse_hex_u64, to_hex_quantity, LogFilterParams, RawLog};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::RpcTransport;
pub use ws::{subscribe, SubscriptionId, WsSubscription};
