//! DevTools WebSocket client for one page target.
//!
//! A single background task owns the WebSocket and correlates JSON-RPC
//! responses back to callers by command id; callers talk to it through a
//! channel, so no lock guards the write half. Frames without an `id` are
//! DevTools events; this client drives navigation by polling
//! `document.readyState` instead of subscribing to lifecycle events, so
//! events are logged at trace level and dropped.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use crate::error::BrowserError;

/// Default per-command response timeout.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// One in-flight command handed to the connection task.
struct PendingCall {
    method: String,
    params: Value,
    reply: oneshot::Sender<Result<Value, BrowserError>>,
}

/// Client handle for one DevTools page target.
///
/// Dropping the handle closes the channel, which ends the background task
/// and the WebSocket with it.
pub struct CdpConnection {
    call_tx: mpsc::Sender<PendingCall>,
}

impl CdpConnection {
    /// Connect to a page target's `webSocketDebuggerUrl`.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        tracing::debug!(url = ws_url, "connecting to DevTools target");

        let (stream, _) = tokio_tungstenite::connect_async(ws_url).await.map_err(|e| {
            BrowserError::ConnectionFailed {
                endpoint: ws_url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let (call_tx, call_rx) = mpsc::channel(32);
        tokio::spawn(drive(stream, call_rx));

        Ok(Self { call_tx })
    }

    /// Send a DevTools command and wait for its response value.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.call_with_timeout(method, params, COMMAND_TIMEOUT).await
    }

    /// Send a DevTools command with an explicit response timeout.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let call = PendingCall {
            method: method.to_string(),
            params,
            reply: reply_tx,
        };

        self.call_tx
            .send(call)
            .await
            .map_err(|_| BrowserError::Protocol {
                detail: "connection task has exited".to_string(),
            })?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BrowserError::Protocol {
                detail: "connection closed before response arrived".to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                method: method.to_string(),
                duration: timeout,
            }),
        }
    }

    /// Enable the DevTools domains a fresh page target needs.
    pub async fn enable_domains(&self) -> Result<(), BrowserError> {
        self.call("Page.enable", json!({})).await?;
        self.call("Runtime.enable", json!({})).await?;
        Ok(())
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Background task: owns the socket, assigns command ids, and routes
/// responses back to waiting callers.
async fn drive(mut stream: WsStream, mut call_rx: mpsc::Receiver<PendingCall>) {
    let mut next_id: u64 = 1;
    let mut pending: HashMap<u64, oneshot::Sender<Result<Value, BrowserError>>> = HashMap::new();

    loop {
        tokio::select! {
            call = call_rx.recv() => {
                let Some(call) = call else {
                    // Handle dropped; we're done.
                    break;
                };
                let id = next_id;
                next_id += 1;

                let frame = json!({"id": id, "method": call.method, "params": call.params});
                tracing::trace!(id, method = %call.method, "sending DevTools command");

                match stream.send(Message::Text(frame.to_string())).await {
                    Ok(()) => {
                        pending.insert(id, call.reply);
                    }
                    Err(e) => {
                        let _ = call.reply.send(Err(BrowserError::Protocol {
                            detail: format!("WebSocket send failed: {e}"),
                        }));
                        break;
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => route_frame(&mut pending, &text),
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("DevTools WebSocket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "DevTools WebSocket read error");
                        break;
                    }
                }
            }
        }
    }

    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(BrowserError::Protocol {
            detail: "connection closed".to_string(),
        }));
    }
}

/// Route one inbound frame: responses resolve pending calls, events are
/// dropped.
fn route_frame(
    pending: &mut HashMap<u64, oneshot::Sender<Result<Value, BrowserError>>>,
    text: &str,
) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable DevTools frame");
            return;
        }
    };

    let Some(id) = frame.get("id").and_then(Value::as_u64) else {
        if let Some(method) = frame.get("method").and_then(Value::as_str) {
            tracing::trace!(event = method, "ignoring DevTools event");
        }
        return;
    };

    let Some(reply) = pending.remove(&id) else {
        tracing::debug!(id, "response for unknown command id");
        return;
    };

    let _ = reply.send(outcome_of(&frame));
}

/// Split a response frame into the command outcome.
fn outcome_of(frame: &Value) -> Result<Value, BrowserError> {
    if let Some(error) = frame.get("error") {
        return Err(BrowserError::Cdp {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown DevTools error")
                .to_string(),
        });
    }
    Ok(frame.get("result").cloned().unwrap_or(Value::Null))
}
