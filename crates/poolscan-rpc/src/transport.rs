//! The `RpcTransport` trait: request/response abstraction over a node.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// An async request/response JSON-RPC transport.
///
/// The trait is object-safe for `send` and can be stored as
/// `Arc<dyn RpcTransport>`; `call` is a typed convenience on top.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// The transport's identifier (URL or name).
    fn url(&self) -> &str;

    /// Call a method and deserialize the result.
    async fn call<T: DeserializeOwned>(
        &self,
        id: u64,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError>
    where
        Self: Sized,
    {
        let req = JsonRpcRequest::new(id, method, params);
        let resp = self.send(req).await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        serde_json::from_value(result).map_err(TransportError::Deserialization)
    }
}
