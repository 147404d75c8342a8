//! Edge agent configuration loading.
//!
//! TOML is the sole config source. Default path:
//! `/etc/fireline/edge-agent.toml`.
//!
//! Required fields: `schema_version = 1`, `server.url`, `auth.device_key`,
//! and BLE peer addresses for all three sensors under `[sensors.*]`.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub schema_version: u32,
    pub device_key: String,
    pub server: ServerConfig,
    pub local_store: LocalStoreConfig,
    pub retry: RetryConfig,
    pub sensors: SensorsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    pub foot_sqlite_path: String,
    pub accel_sqlite_path: String,
    pub retention: Duration,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub poll_interval: Duration,
    pub max_records: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub webhook_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SensorsConfig {
    pub left_foot: SensorConfig,
    pub right_foot: SensorConfig,
    pub accelerometer: SensorConfig,
}

#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub peer_address: String,
    pub throttle: u32,
    pub max_connect_attempts: u32,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    schema_version: Option<u32>,
    auth: Option<RawAuthConfig>,
    server: Option<RawServerConfig>,
    local_store: Option<RawLocalStoreConfig>,
    retry: Option<RawRetryConfig>,
    sensors: Option<RawSensorsConfig>,
}

#[derive(Debug, Deserialize)]
struct RawAuthConfig {
    device_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawServerConfig {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocalStoreConfig {
    foot_sqlite_path: Option<String>,
    accel_sqlite_path: Option<String>,
    retention_hours: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawRetryConfig {
    poll_interval_secs: Option<u64>,
    max_records: Option<u32>,
    base_backoff_secs: Option<u64>,
    max_backoff_secs: Option<u64>,
    webhook_urls: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawSensorsConfig {
    left_foot: Option<RawSensorConfig>,
    right_foot: Option<RawSensorConfig>,
    accelerometer: Option<RawSensorConfig>,
}

#[derive(Debug, Deserialize)]
struct RawSensorConfig {
    peer_address: Option<String>,
    throttle: Option<u32>,
    max_connect_attempts: Option<u32>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn load_config_from_path(path: &Path) -> Result<EdgeConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<EdgeConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/fireline/edge-agent.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<EdgeConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let schema_version = raw
        .schema_version
        .ok_or_else(|| ConfigError::MissingField("schema_version".to_owned()))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue(format!(
            "schema_version must be 1, got {}",
            schema_version
        )));
    }

    let device_key = raw
        .auth
        .and_then(|a| a.device_key)
        .ok_or_else(|| ConfigError::MissingField("auth.device_key".to_owned()))?;

    let server_url = raw
        .server
        .and_then(|s| s.url)
        .ok_or_else(|| ConfigError::MissingField("server.url".to_owned()))?;

    let local_store = match raw.local_store {
        Some(l) => LocalStoreConfig {
            foot_sqlite_path: l
                .foot_sqlite_path
                .unwrap_or_else(|| "/var/lib/fireline/foot.sqlite3".to_owned()),
            accel_sqlite_path: l
                .accel_sqlite_path
                .unwrap_or_else(|| "/var/lib/fireline/accel.sqlite3".to_owned()),
            retention: Duration::from_secs(l.retention_hours.unwrap_or(24) * 3600),
        },
        None => LocalStoreConfig {
            foot_sqlite_path: "/var/lib/fireline/foot.sqlite3".to_owned(),
            accel_sqlite_path: "/var/lib/fireline/accel.sqlite3".to_owned(),
            retention: Duration::from_secs(24 * 3600),
        },
    };

    let retry = match raw.retry {
        Some(r) => RetryConfig {
            poll_interval: Duration::from_secs(r.poll_interval_secs.unwrap_or(30)),
            max_records: r.max_records.unwrap_or(100),
            base_backoff: Duration::from_secs(r.base_backoff_secs.unwrap_or(60)),
            max_backoff: Duration::from_secs(r.max_backoff_secs.unwrap_or(3600)),
            webhook_urls: r.webhook_urls.unwrap_or_default(),
        },
        None => RetryConfig {
            poll_interval: Duration::from_secs(30),
            max_records: 100,
            base_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(3600),
            webhook_urls: Vec::new(),
        },
    };

    let raw_sensors = raw
        .sensors
        .ok_or_else(|| ConfigError::MissingField("sensors".to_owned()))?;

    let left_foot = sensor_config("sensors.left_foot", raw_sensors.left_foot)?;
    let right_foot = sensor_config("sensors.right_foot", raw_sensors.right_foot)?;
    let accelerometer = sensor_config("sensors.accelerometer", raw_sensors.accelerometer)?;

    Ok(EdgeConfig {
        schema_version,
        device_key,
        server: ServerConfig { url: server_url },
        local_store,
        retry,
        sensors: SensorsConfig {
            left_foot,
            right_foot,
            accelerometer,
        },
    })
}

fn sensor_config(
    field_prefix: &str,
    raw: Option<RawSensorConfig>,
) -> Result<SensorConfig, ConfigError> {
    let raw = raw.ok_or_else(|| ConfigError::MissingField(field_prefix.to_owned()))?;
    let peer_address = raw
        .peer_address
        .ok_or_else(|| ConfigError::MissingField(format!("{field_prefix}.peer_address")))?;
    Ok(SensorConfig {
        peer_address,
        throttle: raw.throttle.unwrap_or(1),
        max_connect_attempts: raw.max_connect_attempts.unwrap_or(5),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}
