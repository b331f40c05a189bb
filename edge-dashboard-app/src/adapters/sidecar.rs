//! Sidecar config channel
//!
//! Talks JSON-RPC 2.0 over a WebSocket to the local edge sidecar. One writer
//! task owns the sink; one reader task routes replies to waiting callers by
//! request id and turns `_event` notifications into [`EdgeEvent`]s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use edge_dashboard_core::error::{CoreError, CoreResult};
use edge_dashboard_core::traits::{ConfigChannel, EVENT_BUFFER};
use edge_dashboard_core::types::{ConfigPatch, EdgeEvent};

const EVENT_METHOD: &str = "_event";
const UPDATE_METHOD: &str = "update_edge_config";
const REGISTER_HOOKS_METHOD: &str = "register_edge_config_hooks";

type RpcReply = Result<Value, String>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcReply>>>>;

/// Parsed inbound frame
#[derive(Debug, PartialEq)]
enum Incoming {
    Reply { id: u64, reply: RpcReply },
    Event(EdgeEvent),
    Ignored,
}

/// Sidecar WebSocket channel
pub struct SidecarConfigChannel {
    outgoing: mpsc::UnboundedSender<String>,
    pending: PendingMap,
    next_id: AtomicU64,
    events: broadcast::Sender<EdgeEvent>,
    request_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl SidecarConfigChannel {
    /// Connect and ask the sidecar to start broadcasting config snapshots
    pub async fn connect(url: &str, request_timeout: Duration) -> CoreResult<Self> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| CoreError::ChannelError(format!("Failed to connect to {url}: {e}")))?;
        let (mut sink, mut stream) = socket.split();
        log::info!("Connected to edge sidecar at {url}");

        let (outgoing, mut outbox) = mpsc::unbounded_channel::<String>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let writer = tokio::spawn(async move {
            while let Some(text) = outbox.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    log::error!("Sidecar send failed: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = {
            let pending = Arc::clone(&pending);
            let events = events.clone();
            tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            dispatch(parse_incoming(text.as_str()), &pending, &events).await;
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            log::warn!("Sidecar connection error: {e}");
                            break;
                        }
                    }
                }
                log::info!("Edge sidecar connection closed");
                // Dropping the senders wakes every waiting caller with ChannelClosed
                pending.lock().await.clear();
            })
        };

        let channel = Self {
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
            events,
            request_timeout,
            tasks: vec![writer, reader],
        };
        let reply = channel.call(REGISTER_HOOKS_METHOD, json!({})).await?;
        check_status(&reply)?;
        Ok(channel)
    }

    /// Issue one request and wait for its reply
    async fn call(&self, method: &str, params: Value) -> CoreResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        if self.outgoing.send(request.to_string()).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(CoreError::ChannelClosed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(message))) => Err(CoreError::RemoteRejected(message)),
            Ok(Err(_)) => Err(CoreError::ChannelClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(CoreError::Timeout(
                    u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }
}

impl Drop for SidecarConfigChannel {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl ConfigChannel for SidecarConfigChannel {
    async fn update_edge_config(&self, patch: &ConfigPatch) -> CoreResult<()> {
        let params = serde_json::to_value(patch)?;
        let reply = self.call(UPDATE_METHOD, params).await?;
        check_status(&reply)
    }

    fn subscribe(&self) -> broadcast::Receiver<EdgeEvent> {
        self.events.subscribe()
    }
}

async fn dispatch(incoming: Incoming, pending: &PendingMap, events: &broadcast::Sender<EdgeEvent>) {
    match incoming {
        Incoming::Reply { id, reply } => {
            let Some(waiter) = pending.lock().await.remove(&id) else {
                log::debug!("Reply for unknown request {id}");
                return;
            };
            let _ = waiter.send(reply);
        }
        Incoming::Event(event) => {
            log::debug!("Edge event: {}", event.kind());
            let _ = events.send(event);
        }
        Incoming::Ignored => {}
    }
}

/// Classify one text frame from the sidecar
fn parse_incoming(text: &str) -> Incoming {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        log::warn!("Invalid JSON from sidecar: {text}");
        return Incoming::Ignored;
    };

    if frame.get("method").and_then(Value::as_str) == Some(EVENT_METHOD) {
        let params = frame.get("params").cloned().unwrap_or(Value::Null);
        let Some(kind) = params.get("type").and_then(Value::as_str) else {
            log::warn!("Edge event without a type");
            return Incoming::Ignored;
        };
        let payload = params.get("payload").cloned().unwrap_or(Value::Null);
        return match EdgeEvent::from_parts(kind, payload) {
            Ok(event) => Incoming::Event(event),
            Err(e) => {
                log::warn!("Malformed '{kind}' event: {e}");
                Incoming::Ignored
            }
        };
    }

    let Some(id) = frame.get("id").and_then(Value::as_u64) else {
        if let Some(error) = frame.get("error") {
            log::warn!("Sidecar error without request id: {error}");
        }
        return Incoming::Ignored;
    };

    let reply = match frame.get("error") {
        Some(error) => Err(error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), ToString::to_string)),
        None => Ok(frame.get("result").cloned().unwrap_or(Value::Null)),
    };
    Incoming::Reply { id, reply }
}

/// Map a `{"status", "message"}` result to success or `RemoteRejected`
fn check_status(result: &Value) -> CoreResult<()> {
    if result.get("status").and_then(Value::as_str) == Some("error") {
        let message = result
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(CoreError::RemoteRejected(message.to_string()));
    }
    Ok(())
}
