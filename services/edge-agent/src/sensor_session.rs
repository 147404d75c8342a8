//! Per-sensor BLE state machine.
//!
//! One instance per sensor. Owns its BLE connection and its fragmentation
//! buffer exclusively -- never shared across tasks. Driven by
//! `tokio::select!` over the notification stream, a keep-alive ticker, and
//! a `watch`-channel cancellation signal.

use btleplug::api::{Central, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use fireline_protocol::{Device, Reading};
use fireline_parse::{parse_accel_frame, parse_foot_frame, ACCEL_FRAME_LEN};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SensorSessionError {
    #[error("BLE error: {0}")]
    Ble(#[from] btleplug::Error),
    #[error("peer not present after {0} connect attempts")]
    ConnectExhausted(u32),
}

/// Static configuration for one Sensor Session.
#[derive(Debug, Clone)]
pub struct SensorSessionConfig {
    pub device: Device,
    pub characteristic_uuid: Uuid,
    pub throttle: u32,
    pub max_connect_attempts: u32,
    pub start_command: Option<Vec<u8>>,
    pub stop_command: Option<Vec<u8>>,
    pub keep_alive: Option<KeepAliveConfig>,
}

#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    pub bytes: Vec<u8>,
    pub period: Duration,
}

const CONNECT_ATTEMPT_SPACING: Duration = Duration::from_secs(3);
const CONNECT_DEADLINE: Duration = Duration::from_secs(10);
const WRITE_DEADLINE: Duration = Duration::from_secs(1);

/// Reassembles fragmented BLE notifications into complete frames and
/// parses them, owned exclusively by one Sensor Session.
struct FragmentBuffer {
    device: Device,
    buf: Vec<u8>,
}

impl FragmentBuffer {
    fn new(device: Device) -> Self {
        FragmentBuffer { device, buf: Vec::new() }
    }

    /// Append newly-received bytes and drain every complete frame found.
    fn push(&mut self, chunk: &[u8]) -> Vec<Reading> {
        self.buf.extend_from_slice(chunk);
        match self.device {
            Device::LeftFoot | Device::RightFoot => self.drain_foot_frames(),
            Device::Accelerometer => self.drain_accel_frames(),
        }
    }

    fn drain_foot_frames(&mut self) -> Vec<Reading> {
        let mut out = Vec::new();
        while let Some(nl) = self.buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=nl).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]);
            match parse_foot_frame(&line) {
                Ok(frame) => out.push(Reading::Foot(fireline_protocol::reading::FootReading {
                    timestamp: now_iso8601_millis(),
                    device: frame.device,
                    values: frame.values,
                    max: frame.max,
                    avg: frame.avg,
                    active_count: frame.active_count,
                })),
                Err(e) => debug!(error = %e, "malformed foot frame dropped"),
            }
        }
        out
    }

    fn drain_accel_frames(&mut self) -> Vec<Reading> {
        let mut out = Vec::new();
        loop {
            if self.buf.len() < ACCEL_FRAME_LEN {
                break;
            }
            match parse_accel_frame(&self.buf[..ACCEL_FRAME_LEN]) {
                Ok(frame) => {
                    self.buf.drain(..ACCEL_FRAME_LEN);
                    out.push(Reading::Accel(fireline_protocol::reading::AccelReading {
                        timestamp: now_iso8601_millis(),
                        acc: frame.acc,
                        gyro: frame.gyro,
                        angle: frame.angle,
                    }));
                }
                Err(_) => {
                    // Header mismatch: drop one byte and resync. Converges
                    // within at most one frame length.
                    self.buf.remove(0);
                }
            }
        }
        out
    }
}

/// Per-session frame counter: a frame is forwarded iff `k mod N == 0`,
/// where `k` is the count of valid parsed frames seen so far.
struct Throttle {
    n: u32,
    k: u32,
}

impl Throttle {
    fn new(n: u32) -> Self {
        Throttle { n: n.max(1), k: 0 }
    }

    /// Checks before incrementing, so the first valid frame (`k == 0`)
    /// always forwards regardless of `n`.
    fn should_forward(&mut self) -> bool {
        let forward = self.k % self.n == 0;
        self.k += 1;
        forward
    }
}

/// Run one Sensor Session to completion (either cancellation or fatal
/// exhaustion of connect attempts). `readings_tx` receives every Reading
/// that survives parsing and throttling, in parse order.
pub async fn run_sensor_session(
    adapter: btleplug::platform::Adapter,
    peer_address: btleplug::api::BDAddr,
    cfg: SensorSessionConfig,
    readings_tx: mpsc::Sender<Reading>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SensorSessionError> {
    let peripheral = connect_with_retries(&adapter, peer_address, cfg.max_connect_attempts).await?;

    if let Some(start) = &cfg.start_command {
        let _ = tokio::time::timeout(
            WRITE_DEADLINE,
            peripheral.write(
                &find_characteristic(&peripheral, cfg.characteristic_uuid).await?,
                start,
                WriteType::WithoutResponse,
            ),
        )
        .await;
    }

    let characteristic = find_characteristic(&peripheral, cfg.characteristic_uuid).await?;
    peripheral.subscribe(&characteristic).await?;
    let mut notifications = peripheral.notifications().await?;

    let mut fragbuf = FragmentBuffer::new(cfg.device);
    let mut throttle = Throttle::new(cfg.throttle);

    let mut keep_alive_ticker = cfg.keep_alive.as_ref().map(|ka| tokio::time::interval(ka.period));

    info!(device = ?cfg.device, "sensor session streaming");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            Some(notif) = notifications.next() => {
                let readings = fragbuf.push(&notif.value);
                for reading in readings {
                    if throttle.should_forward() {
                        if readings_tx.send(reading).await.is_err() {
                            break;
                        }
                    }
                }
            }
            _ = tick(&mut keep_alive_ticker) => {
                if let Some(ka) = &cfg.keep_alive {
                    let _ = tokio::time::timeout(
                        WRITE_DEADLINE,
                        peripheral.write(&characteristic, &ka.bytes, WriteType::WithoutResponse),
                    ).await;
                }
            }
        }
    }

    if let Some(stop) = &cfg.stop_command {
        let _ = tokio::time::timeout(
            WRITE_DEADLINE,
            peripheral.write(&characteristic, stop, WriteType::WithoutResponse),
        )
        .await;
    }
    let _ = peripheral.unsubscribe(&characteristic).await;
    let _ = peripheral.disconnect().await;

    Ok(())
}

async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn connect_with_retries(
    adapter: &btleplug::platform::Adapter,
    peer_address: btleplug::api::BDAddr,
    max_attempts: u32,
) -> Result<Peripheral, SensorSessionError> {
    for attempt in 1..=max_attempts {
        match tokio::time::timeout(CONNECT_DEADLINE, try_connect(adapter, peer_address)).await {
            Ok(Ok(peripheral)) => return Ok(peripheral),
            Ok(Err(e)) => warn!(attempt, error = %e, "BLE connect attempt failed"),
            Err(_) => warn!(attempt, "BLE connect attempt timed out"),
        }
        if attempt < max_attempts {
            tokio::time::sleep(CONNECT_ATTEMPT_SPACING).await;
        }
    }
    Err(SensorSessionError::ConnectExhausted(max_attempts))
}

async fn try_connect(
    adapter: &btleplug::platform::Adapter,
    peer_address: btleplug::api::BDAddr,
) -> Result<Peripheral, btleplug::Error> {
    let peripherals = adapter.peripherals().await?;
    let peripheral = peripherals
        .into_iter()
        .find(|p| p.address() == peer_address)
        .ok_or(btleplug::Error::DeviceNotFound)?;
    peripheral.connect().await?;
    peripheral.discover_services().await?;
    Ok(peripheral)
}

async fn find_characteristic(
    peripheral: &Peripheral,
    uuid: Uuid,
) -> Result<btleplug::api::Characteristic, SensorSessionError> {
    let characteristic = peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or(btleplug::Error::NotSupported(
            "characteristic not found".to_owned(),
        ))?;
    Ok(characteristic)
}

fn now_iso8601_millis() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
