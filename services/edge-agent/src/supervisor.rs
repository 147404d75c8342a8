//! Orchestrates Sensor Sessions, the fan-out, and shutdown.
//!
//! Brings up Sensor Sessions in priority order (left foot, right foot,
//! accelerometer) with a 3s gap between connect attempts — a shared BLE
//! stack cannot safely attempt two connections simultaneously. Installs
//! the fan-out callback: on Reading, save to the Local Store, then emit
//! via the Broadcast Client. The two are independent; a broadcast failure
//! must never prevent or undo the save.

use crate::broadcast_client::{BroadcastClient, DeliveryOutcome};
use crate::config::EdgeConfig;
use crate::local_store::LocalStore;
use crate::retry_sender::{RetrySender, RetrySenderConfig};
use crate::sensor_session::{self, KeepAliveConfig, SensorSessionConfig};
use btleplug::api::{Central, Manager as _};
use fireline_protocol::wire::{AccelerometerEvent, FootPressureEvent, EVENT_ACCELEROMETER, EVENT_FOOT_PRESSURE};
use fireline_protocol::{Device, Reading};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info};

const PRIORITY_GAP: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("BLE adapter error: {0}")]
    Ble(#[from] btleplug::Error),
    #[error("local store error: {0}")]
    LocalStore(#[from] crate::local_store::LocalStoreError),
}

pub struct Supervisor {
    cfg: EdgeConfig,
}

impl Supervisor {
    pub fn new(cfg: EdgeConfig) -> Self {
        Supervisor { cfg }
    }

    /// Run the supervisor until `shutdown` is signalled. Brings up the
    /// Broadcast Client, both Local Stores, both Retry Senders, and all
    /// three Sensor Sessions, then blocks fanning out readings until
    /// cancellation.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), SupervisorError> {
        let broadcast = Arc::new(BroadcastClient::new(
            self.cfg.server.url.clone(),
            self.cfg.device_key.clone(),
        ));
        broadcast.start();

        let foot_store = Arc::new(Mutex::new(LocalStore::open(Path::new(
            &self.cfg.local_store.foot_sqlite_path,
        ))?));
        let accel_store = Arc::new(Mutex::new(LocalStore::open(Path::new(
            &self.cfg.local_store.accel_sqlite_path,
        ))?));

        spawn_retry_sender(foot_store.clone(), broadcast.clone(), &self.cfg);
        spawn_retry_sender(accel_store.clone(), broadcast.clone(), &self.cfg);

        let manager = btleplug::platform::Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(btleplug::Error::DeviceNotFound)?;

        let (readings_tx, mut readings_rx) = mpsc::channel::<Reading>(256);
        let mut session_shutdowns = Vec::new();

        for (device, sensor_cfg, gap) in [
            (Device::LeftFoot, &self.cfg.sensors.left_foot, Duration::ZERO),
            (Device::RightFoot, &self.cfg.sensors.right_foot, PRIORITY_GAP),
            (
                Device::Accelerometer,
                &self.cfg.sensors.accelerometer,
                PRIORITY_GAP,
            ),
        ] {
            tokio::time::sleep(gap).await;

            let (session_shutdown_tx, session_shutdown_rx) = watch::channel(false);
            session_shutdowns.push(session_shutdown_tx);

            let address: btleplug::api::BDAddr = sensor_cfg
                .peer_address
                .parse()
                .unwrap_or_else(|_| btleplug::api::BDAddr::from([0, 0, 0, 0, 0, 0]));

            let session_config = SensorSessionConfig {
                device,
                characteristic_uuid: characteristic_uuid_for(device),
                throttle: sensor_cfg.throttle,
                max_connect_attempts: sensor_cfg.max_connect_attempts,
                start_command: Some(b"begin".to_vec()),
                stop_command: Some(b"end".to_vec()),
                keep_alive: matches!(device, Device::Accelerometer).then(|| KeepAliveConfig {
                    bytes: vec![0xFF, 0xAA, 0x27, 0x3A, 0x00],
                    period: Duration::from_secs(1),
                }),
            };

            let adapter = adapter.clone();
            let tx = readings_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = sensor_session::run_sensor_session(
                    adapter,
                    address,
                    session_config,
                    tx,
                    session_shutdown_rx,
                )
                .await
                {
                    error!(?device, error = %e, "sensor session exited fatally; peers continue");
                }
            });
        }
        drop(readings_tx);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                Some(reading) = readings_rx.recv() => {
                    fan_out(&reading, &foot_store, &accel_store, &broadcast).await;
                }
            }
        }

        info!("supervisor shutting down: cancelling sensor sessions");
        for tx in &session_shutdowns {
            let _ = tx.send(true);
        }

        Ok(())
    }
}

/// `Local Store.save(reading)` always; `Broadcast Client.emit` best
/// effort. A broadcast failure never undoes the save.
async fn fan_out(
    reading: &Reading,
    foot_store: &Arc<Mutex<LocalStore>>,
    accel_store: &Arc<Mutex<LocalStore>>,
    broadcast: &Arc<BroadcastClient>,
) {
    let store = match reading {
        Reading::Foot(_) => foot_store,
        Reading::Accel(_) => accel_store,
    };

    {
        let mut store = store.lock().await;
        if let Err(e) = store.save(reading) {
            error!(error = %e, "local store save failed, reading dropped");
            return;
        }
    }

    let outcome = match reading {
        Reading::Foot(f) => {
            let event: FootPressureEvent = f.into();
            broadcast
                .emit(EVENT_FOOT_PRESSURE, serde_json::to_value(&event).unwrap())
                .await
        }
        Reading::Accel(a) => {
            let event: AccelerometerEvent = a.into();
            broadcast
                .emit(EVENT_ACCELEROMETER, serde_json::to_value(&event).unwrap())
                .await
        }
    };
    if outcome != DeliveryOutcome::HandedOffToTransport {
        // Expected under disconnect; the Retry Sender will catch up.
    }
}

fn spawn_retry_sender(store: Arc<Mutex<LocalStore>>, broadcast: Arc<BroadcastClient>, cfg: &EdgeConfig) {
    let retry_cfg = RetrySenderConfig {
        poll_interval: cfg.retry.poll_interval,
        max_records: cfg.retry.max_records,
        base_backoff: cfg.retry.base_backoff,
        max_backoff: cfg.retry.max_backoff,
        webhook_urls: cfg.retry.webhook_urls.clone(),
        retention: cfg.local_store.retention,
    };
    let sender = RetrySender::new(store, broadcast, retry_cfg);
    tokio::spawn(sender.run());
}

/// Sensor characteristic UUIDs are device-firmware constants; these are
/// fixed per deployment and supplied here rather than in config, since
/// every unit of a given sensor kind shares the same GATT layout.
fn characteristic_uuid_for(device: Device) -> uuid::Uuid {
    let s = match device {
        Device::LeftFoot | Device::RightFoot => "0000fff1-0000-1000-8000-00805f9b34fb",
        Device::Accelerometer => "0000fff2-0000-1000-8000-00805f9b34fb",
    };
    s.parse().expect("characteristic UUID constants are well-formed")
}
