//! WebSocket `eth_subscribe` client.
//!
//! Opens one connection per subscription, waits for the node to confirm it,
//! then forwards every `eth_subscription` notification from a background
//! task. The connection is never re-established here: a drop is reported on
//! the error channel and the owner decides whether to subscribe again.

use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcId};

const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// A unique subscription ID returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A confirmed subscription. Dropping it closes the connection.
#[derive(Debug)]
pub struct WsSubscription<T> {
    pub id: SubscriptionId,
    pub items: mpsc::UnboundedReceiver<T>,
    /// Receives at most one error: the one that ended the connection.
    pub errors: mpsc::UnboundedReceiver<TransportError>,
    task: JoinHandle<()>,
}

impl<T> Drop for WsSubscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connect to `url` and issue `eth_subscribe(kind, params)`.
///
/// Fails with [`TransportError::Rpc`] if the node refuses the subscription.
pub async fn subscribe<T>(
    url: &str,
    kind: &str,
    params: Value,
) -> Result<WsSubscription<T>, TransportError>
where
    T: DeserializeOwned + Send + 'static,
{
    tracing::info!(url, kind, "connecting via WebSocket");
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| TransportError::WebSocket(format!("connect failed: {e}")))?;
    let (mut write, mut read) = ws_stream.split();

    let req = JsonRpcRequest::new(
        SUBSCRIBE_REQUEST_ID,
        "eth_subscribe",
        vec![Value::String(kind.to_string()), params],
    );
    let msg = serde_json::to_string(&req)?;
    write
        .send(Message::Text(msg.into()))
        .await
        .map_err(|e| TransportError::WebSocket(format!("send failed: {e}")))?;

    // Wait for the confirmation carrying the subscription id.
    let id = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(id) = parse_confirmation(text.as_str())? {
                    break id;
                }
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportError::WebSocket(
                    "connection closed before subscription was confirmed".into(),
                ));
            }
            Some(Err(e)) => return Err(TransportError::WebSocket(e.to_string())),
            Some(Ok(_)) => {}
        }
    };
    tracing::info!(url, subscription = %id, "subscription confirmed");

    let (item_tx, item_rx) = mpsc::unbounded_channel();
    let (err_tx, err_rx) = mpsc::unbounded_channel();
    let task_id = id.clone();

    let task = tokio::spawn(async move {
        let reason = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    match parse_notification::<T>(text.as_str(), &task_id) {
                        Some(Ok(item)) => {
                            if item_tx.send(item).is_err() {
                                // Receiver dropped
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "skipping undecodable notification");
                        }
                        None => {}
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) => break "closed by server".to_string(),
                Some(Ok(_)) => {} // binary / pong: ignore
                Some(Err(e)) => break e.to_string(),
                None => break "stream ended".to_string(),
            }
        };
        tracing::warn!(subscription = %task_id, reason = %reason, "WebSocket subscription ended");
        let _ = err_tx.send(TransportError::WebSocket(reason));
    });

    Ok(WsSubscription {
        id,
        items: item_rx,
        errors: err_rx,
        task,
    })
}

/// Returns the subscription id if `text` is the response to our subscribe
/// request, an error if the node refused it, `None` for anything else.
fn parse_confirmation(text: &str) -> Result<Option<SubscriptionId>, TransportError> {
    let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(text) else {
        return Ok(None);
    };
    if resp.id != RpcId::Number(SUBSCRIBE_REQUEST_ID) {
        return Ok(None);
    }
    let result = resp.into_result().map_err(TransportError::Rpc)?;
    match result {
        Value::String(id) => Ok(Some(SubscriptionId(id))),
        other => Err(TransportError::WebSocket(format!(
            "unexpected subscription id: {other}"
        ))),
    }
}

/// Extract the payload of an `eth_subscription` notification for `id`.
fn parse_notification<T: DeserializeOwned>(
    text: &str,
    id: &SubscriptionId,
) -> Option<Result<T, serde_json::Error>> {
    let v: Value = serde_json::from_str(text).ok()?;
    if v.get("method")?.as_str()? != "eth_subscription" {
        return None;
    }
    let params = v.get("params")?;
    if params.get("subscription")?.as_str()? != id.0 {
        return None;
    }
    Some(serde_json::from_value(params.get("result")?.clone()))
}
