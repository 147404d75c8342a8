//! Long-lived connection to the server bus.
//!
//! Socket.IO namespace `/iot`, talking to a `socketioxide` server over
//! `rust_socketio`'s async client. Reconnects forever with exponential
//! backoff (5s floor, 60s cap) and never buffers readings itself — that
//! job belongs to the Local Store + Retry Sender.

use fireline_protocol::wire::{EVENT_AUTHENTICATE, NAMESPACE};
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::Payload;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

const BACKOFF_FLOOR: Duration = Duration::from_secs(5);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Outcome of a single [`BroadcastClient::emit`] call. Never an error —
/// a disconnected client silently fails to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    HandedOffToTransport,
    NotDelivered,
}

struct Inner {
    client: Option<Client>,
}

/// A best-effort, reconnecting conduit to the server's `/iot` namespace.
pub struct BroadcastClient {
    server_url: String,
    device_key: String,
    inner: Arc<RwLock<Inner>>,
    /// Woken by `emit` whenever it observes the transport has gone away,
    /// so the reconnect loop doesn't have to poll for drops.
    reconnect: Arc<Notify>,
}

impl BroadcastClient {
    pub fn new(server_url: impl Into<String>, device_key: impl Into<String>) -> Self {
        BroadcastClient {
            server_url: server_url.into(),
            device_key: device_key.into(),
            inner: Arc::new(RwLock::new(Inner { client: None })),
            reconnect: Arc::new(Notify::new()),
        }
    }

    /// Spawn the connect/reconnect loop in the background. Returns
    /// immediately; connection state is observed via `emit`. Runs forever:
    /// every drop detected by `emit` wakes this loop to reconnect with
    /// exponential backoff (5s floor, 60s cap).
    pub fn start(&self) {
        let server_url = self.server_url.clone();
        let device_key = self.device_key.clone();
        let inner = self.inner.clone();
        let reconnect = self.reconnect.clone();
        tokio::spawn(async move {
            let mut backoff = BACKOFF_FLOOR;
            loop {
                match connect_once(&server_url, &device_key).await {
                    Ok(client) => {
                        info!(server_url = %server_url, "broadcast client connected");
                        backoff = BACKOFF_FLOOR;
                        inner.write().await.client = Some(client);
                        // Wait until `emit` notices the transport dropped,
                        // then loop back around to reconnect.
                        reconnect.notified().await;
                        inner.write().await.client = None;
                    }
                    Err(e) => {
                        warn!(error = %e, backoff_secs = backoff.as_secs(), "broadcast client connect failed, retrying");
                        tokio::time::sleep(backoff).await;
                        backoff = std::cmp::min(backoff * 2, BACKOFF_CAP);
                    }
                }
            }
        });
    }

    /// Emit one named event. Non-blocking in effect: when disconnected,
    /// returns [`DeliveryOutcome::NotDelivered`] without error.
    pub async fn emit(&self, event_name: &str, payload: serde_json::Value) -> DeliveryOutcome {
        let guard = self.inner.read().await;
        let Some(client) = guard.client.as_ref() else {
            return DeliveryOutcome::NotDelivered;
        };
        match client.emit(event_name, Payload::Text(vec![payload])).await {
            Ok(()) => DeliveryOutcome::HandedOffToTransport,
            Err(e) => {
                warn!(error = %e, event = event_name, "emit failed, scheduling reconnect");
                drop(guard);
                self.reconnect.notify_one();
                DeliveryOutcome::NotDelivered
            }
        }
    }
}

async fn connect_once(server_url: &str, device_key: &str) -> Result<Client, rust_socketio::Error> {
    let client = ClientBuilder::new(server_url)
        .namespace(NAMESPACE)
        .connect()
        .await?;
    client
        .emit(
            EVENT_AUTHENTICATE,
            Payload::Text(vec![json!({ "device_key": device_key })]),
        )
        .await?;
    Ok(client)
}
