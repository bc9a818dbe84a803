//! Raw DevTools-protocol connection.
//!
//! One WebSocket per page target. Commands are `{id, method, params}` objects
//! whose responses are correlated back through a pending map of oneshot
//! senders; everything without an `id` is a protocol event and is fanned out
//! to the single subscriber handed back by [`CdpConnection::connect`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

use crate::errors::{AutomationError, Result};

type CommandResult = std::result::Result<Value, String>;
type PendingMap = HashMap<i64, oneshot::Sender<CommandResult>>;
type Pending = Arc<Mutex<PendingMap>>;

/// An event pushed by the browser: method name plus raw parameters.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

/// A live DevTools connection to one page target.
pub struct CdpConnection {
    next_id: AtomicI64,
    pending: Pending,
    outbound: mpsc::UnboundedSender<Message>,
}

impl CdpConnection {
    /// Connect to a page's WebSocket debugger URL. The returned receiver
    /// yields every protocol event the browser pushes on this session.
    pub async fn connect(ws_url: &str) -> Result<(Self, mpsc::UnboundedReceiver<CdpEvent>)> {
        let (stream, _) = connect_async(ws_url).await?;
        let (mut write, mut read) = stream.split();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<CdpEvent>();

        // Writer half: single task owns the sink.
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    warn!("debugger write failed: {e}");
                    break;
                }
            }
        });

        // Reader half: route responses to their oneshot, events to the subscriber.
        let reader_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let value: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("unparseable debugger frame: {e}");
                        continue;
                    }
                };

                if let Some(id) = value.get("id").and_then(Value::as_i64) {
                    let result = match value.get("error") {
                        Some(err) => Err(err
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown protocol error")
                            .to_string()),
                        None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
                    };
                    if let Some(tx) = reader_pending.lock().await.remove(&id) {
                        let _ = tx.send(result);
                    }
                } else if let Some(method) = value.get("method").and_then(Value::as_str) {
                    trace!(method, "debugger event");
                    let event = CdpEvent {
                        method: method.to_string(),
                        params: value.get("params").cloned().unwrap_or(Value::Null),
                    };
                    if event_tx.send(event).is_err() {
                        // Subscriber gone, keep draining so commands still resolve.
                        continue;
                    }
                }
            }
            // Connection is gone: fail everything still waiting.
            let mut map = reader_pending.lock().await;
            for (_, tx) in map.drain() {
                let _ = tx.send(Err("connection closed".to_string()));
            }
        });

        Ok((
            Self {
                next_id: AtomicI64::new(1),
                pending,
                outbound,
            },
            event_rx,
        ))
    }

    /// Send one command and wait for its response. No timeout and no retry:
    /// a hung browser stalls the caller, a rejected command surfaces as
    /// [`AutomationError::Command`].
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let payload = json!({ "id": id, "method": method, "params": params });
        debug!(method, id, "sending command");
        if self
            .outbound
            .send(Message::Text(payload.to_string()))
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(AutomationError::ConnectionClosed);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(AutomationError::Command {
                method: method.to_string(),
                message,
            }),
            Err(_) => Err(AutomationError::ConnectionClosed),
        }
    }
}
