//! Configuration for predix-daemon

use crate::error::{DaemonError, DaemonResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Listener always binds every interface.
pub const BIND_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Period used for a background task whose interval is unset or unusable.
pub const DEFAULT_TASK_INTERVAL_MS: u64 = 10_000;

/// Main daemon configuration.
///
/// Read once at process start and never mutated afterwards. Keys map one to
/// one onto unprefixed environment variables (`PORT`, `SENSOR_INTERVAL_MS`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Listen port, required
    #[serde(default)]
    pub port: Option<u16>,

    /// Sensor generation period
    #[serde(default = "default_interval", deserialize_with = "lenient_interval")]
    pub sensor_interval_ms: u64,

    /// Prediction period
    #[serde(default = "default_interval", deserialize_with = "lenient_interval")]
    pub predict_interval_ms: u64,

    /// Anomaly scan period
    #[serde(default = "default_interval", deserialize_with = "lenient_interval")]
    pub anomaly_interval_ms: u64,

    /// Origins allowed to call the HTTP API with credentials
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// HMAC secret for access tokens
    #[serde(default)]
    pub jwt_access_secret: Option<Secret>,

    /// PostgreSQL connection URL; in-memory persistence when absent
    #[serde(default)]
    pub database_url: Option<Secret>,

    /// Maximum connections in pool
    #[serde(default = "default_pool_size")]
    pub database_max_connections: u32,

    /// Pause between a successful bind and the first background tick
    #[serde(default = "default_startup_grace")]
    pub startup_grace_ms: u64,

    /// What to do when a tick fires while the previous one is still running
    #[serde(default)]
    pub task_overlap: OverlapPolicy,

    /// Period of the simulated ticket job
    #[serde(default = "default_ticket_interval")]
    pub ticket_interval_ms: u64,

    /// Number of machines in the simulated plant
    #[serde(default = "default_simulated_machines")]
    pub simulated_machines: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: None,
            sensor_interval_ms: DEFAULT_TASK_INTERVAL_MS,
            predict_interval_ms: DEFAULT_TASK_INTERVAL_MS,
            anomaly_interval_ms: DEFAULT_TASK_INTERVAL_MS,
            cors_origins: default_cors_origins(),
            jwt_access_secret: None,
            database_url: None,
            database_max_connections: default_pool_size(),
            startup_grace_ms: default_startup_grace(),
            task_overlap: OverlapPolicy::default(),
            ticket_interval_ms: default_ticket_interval(),
            simulated_machines: default_simulated_machines(),
        }
    }
}

/// Overlap handling for periodic tasks.
///
/// Defaults to `Skip` so a slow adapter never runs concurrently with itself;
/// `Allow` keeps the fire-on-every-tick behaviour for adapters that tolerate it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Skip a tick while the previous invocation is still in flight
    #[default]
    Skip,

    /// Start every tick regardless of in-flight invocations
    Allow,
}

/// Scheduler configuration derived from [`DaemonConfig`]
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub sensor_interval: Duration,
    pub predict_interval: Duration,
    pub anomaly_interval: Duration,
    pub overlap: OverlapPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        DaemonConfig::default().scheduler()
    }
}

/// String value that never shows up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// Default value helpers
fn default_interval() -> u64 {
    DEFAULT_TASK_INTERVAL_MS
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "https://predix-five.vercel.app".to_string(),
    ]
}

fn default_pool_size() -> u32 {
    10
}

fn default_startup_grace() -> u64 {
    5_000
}

fn default_ticket_interval() -> u64 {
    60_000
}

fn default_simulated_machines() -> usize {
    5
}

/// Accepts numbers or numeric strings; anything else, zero included, means default.
fn lenient_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawInterval {
        Int(i64),
        Float(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    let millis = match RawInterval::deserialize(deserializer)? {
        RawInterval::Int(value) => u64::try_from(value).ok(),
        RawInterval::Float(value) => whole_millis(value),
        RawInterval::Text(text) => text.trim().parse::<f64>().ok().and_then(whole_millis),
        RawInterval::Other(_) => None,
    };

    Ok(millis
        .filter(|millis| *millis > 0)
        .unwrap_or(DEFAULT_TASK_INTERVAL_MS))
}

fn whole_millis(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 1.0).then(|| value as u64)
}

impl DaemonConfig {
    /// Load configuration: defaults, then an optional file, then the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Plain environment variables, PORT and friends
        builder = builder.add_source(
            config::Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors_origins"),
        );

        builder.build()?.try_deserialize()
    }

    /// Address to bind. Fails when the port was never configured.
    pub fn listen_addr(&self) -> DaemonResult<SocketAddr> {
        let port = self
            .port
            .ok_or_else(|| DaemonError::Config("PORT is not set".to_string()))?;
        Ok(SocketAddr::new(BIND_HOST, port))
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            sensor_interval: Duration::from_millis(self.sensor_interval_ms),
            predict_interval: Duration::from_millis(self.predict_interval_ms),
            anomaly_interval: Duration::from_millis(self.anomaly_interval_ms),
            overlap: self.task_overlap,
        }
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn ticket_interval(&self) -> Duration {
        Duration::from_millis(self.ticket_interval_ms.max(1))
    }

    /// Create a development configuration
    pub fn development(port: u16) -> Self {
        Self {
            port: Some(port),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_overrides(overrides: &[(&str, &str)]) -> DaemonConfig {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&DaemonConfig::default()).unwrap());
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert!(config.port.is_none());
        assert_eq!(config.sensor_interval_ms, 10_000);
        assert_eq!(config.predict_interval_ms, 10_000);
        assert_eq!(config.anomaly_interval_ms, 10_000);
        assert_eq!(config.startup_grace_ms, 5_000);
        assert_eq!(config.task_overlap, OverlapPolicy::Skip);
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn test_missing_port_is_a_config_error() {
        let err = DaemonConfig::default().listen_addr().unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_listen_addr_binds_all_interfaces() {
        let addr = DaemonConfig::development(8080).listen_addr().unwrap();
        assert_eq!(addr.ip(), BIND_HOST);
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_intervals_from_strings() {
        let config = with_overrides(&[
            ("port", "3000"),
            ("sensor_interval_ms", "1000"),
            ("predict_interval_ms", "abc"),
            ("anomaly_interval_ms", "0"),
        ]);
        assert_eq!(config.port, Some(3000));
        assert_eq!(config.sensor_interval_ms, 1000);
        assert_eq!(config.predict_interval_ms, DEFAULT_TASK_INTERVAL_MS);
        assert_eq!(config.anomaly_interval_ms, DEFAULT_TASK_INTERVAL_MS);
    }

    #[test]
    fn test_overlap_policy_from_string() {
        let config = with_overrides(&[("task_overlap", "allow")]);
        assert_eq!(config.task_overlap, OverlapPolicy::Allow);
        assert_eq!(config.scheduler().overlap, OverlapPolicy::Allow);
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = DaemonConfig {
            jwt_access_secret: Some(Secret::new("super-secret-value")),
            ..DaemonConfig::development(3000)
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("Secret(***)"));
    }

    #[test]
    fn test_scheduler_durations() {
        let config = with_overrides(&[("sensor_interval_ms", "1500")]);
        let scheduler = config.scheduler();
        assert_eq!(scheduler.sensor_interval, Duration::from_millis(1500));
        assert_eq!(scheduler.predict_interval, Duration::from_millis(10_000));
    }
}
