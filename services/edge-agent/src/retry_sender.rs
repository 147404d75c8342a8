//! Background worker that drains a Local Store's unsent rows.
//!
//! One instance per sensor kind (foot, accel), each owning its own
//! [`LocalStore`]. Preferred delivery path is the shared Broadcast Client;
//! if webhook URLs are configured, a JSON POST fallback via `reqwest` is
//! used instead.

use crate::broadcast_client::{BroadcastClient, DeliveryOutcome};
use crate::local_store::LocalStore;
use fireline_protocol::wire::{AccelerometerEvent, FootPressureEvent, EVENT_ACCELEROMETER, EVENT_FOOT_PRESSURE};
use fireline_protocol::Reading;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct RetrySenderConfig {
    pub poll_interval: Duration,
    pub max_records: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub webhook_urls: Vec<String>,
    pub retention: Duration,
}

/// Drains one [`LocalStore`] into the Broadcast Client (or webhook
/// fallback) forever, applying exponential backoff on failed batches.
pub struct RetrySender {
    store: Arc<Mutex<LocalStore>>,
    broadcast: Arc<BroadcastClient>,
    http: reqwest::Client,
    cfg: RetrySenderConfig,
}

impl RetrySender {
    pub fn new(
        store: Arc<Mutex<LocalStore>>,
        broadcast: Arc<BroadcastClient>,
        cfg: RetrySenderConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client must build with static config");
        RetrySender {
            store,
            broadcast,
            http,
            cfg,
        }
    }

    /// Run the poll/transmit/backoff loop. Never returns under normal
    /// operation; intended to be spawned as its own task.
    pub async fn run(mut self) {
        let mut consecutive_failures: u32 = 0;
        loop {
            tokio::time::sleep(self.cfg.poll_interval).await;

            let rows = {
                let store = self.store.lock().await;
                match store.fetch_unsent(self.cfg.max_records) {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(error = %e, "fetch_unsent failed");
                        continue;
                    }
                }
            };

            if rows.is_empty() {
                consecutive_failures = 0;
                self.prune().await;
                continue;
            }

            let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
            let readings: Vec<Reading> = rows.into_iter().map(|r| r.reading).collect();

            let delivered = if self.cfg.webhook_urls.is_empty() {
                self.deliver_via_broadcast(&readings).await
            } else {
                self.deliver_via_webhooks(&readings).await
            };

            if delivered {
                let mut store = self.store.lock().await;
                if let Err(e) = store.mark_sent(&ids) {
                    warn!(error = %e, "mark_sent failed");
                }
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
                let backoff = std::cmp::min(
                    self.cfg.base_backoff * 2u32.saturating_pow(consecutive_failures),
                    self.cfg.max_backoff,
                );
                warn!(consecutive_failures, backoff_secs = backoff.as_secs(), "batch delivery failed, backing off");
                tokio::time::sleep(backoff).await;
            }
        }
    }

    async fn deliver_via_broadcast(&self, readings: &[Reading]) -> bool {
        for reading in readings {
            let outcome = match reading {
                Reading::Foot(f) => {
                    let event: FootPressureEvent = f.into();
                    let payload = serde_json::to_value(&event).expect("FootPressureEvent always serializes");
                    self.broadcast.emit(EVENT_FOOT_PRESSURE, payload).await
                }
                Reading::Accel(a) => {
                    let event: AccelerometerEvent = a.into();
                    let payload = serde_json::to_value(&event).expect("AccelerometerEvent always serializes");
                    self.broadcast.emit(EVENT_ACCELEROMETER, payload).await
                }
            };
            if outcome != DeliveryOutcome::HandedOffToTransport {
                return false;
            }
        }
        true
    }

    async fn deliver_via_webhooks(&self, readings: &[Reading]) -> bool {
        for url in &self.cfg.webhook_urls {
            match self.http.post(url).json(readings).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    warn!(url = %url, status = %resp.status(), "webhook rejected batch");
                    return false;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "webhook POST failed");
                    return false;
                }
            }
        }
        true
    }

    async fn prune(&self) {
        let mut store = self.store.lock().await;
        match store.prune(self.cfg.retention) {
            Ok(deleted) if deleted > 0 => debug!(deleted, "pruned sent rows"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "prune failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_exceeds_max() {
        let base = Duration::from_secs(60);
        let max = Duration::from_secs(3600);
        let mut failures = 0u32;
        let mut last = Duration::ZERO;
        for _ in 0..10 {
            failures += 1;
            let backoff = std::cmp::min(base * 2u32.saturating_pow(failures), max);
            assert!(backoff <= max);
            last = backoff;
        }
        assert_eq!(last, max);
    }
}
