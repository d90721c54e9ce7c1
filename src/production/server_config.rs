//! Service configuration
//!
//! Loaded in layers: defaults, then an optional TOML file named by
//! `VERVE_CONFIG`, then environment overrides:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | VERVE_LISTEN_ADDR | 0.0.0.0:8080 | HTTP listen address |
//! | VERVE_TOPIC | verve-unique-counts | Export topic |
//! | VERVE_BUS | log | `log`, `memory` or `redis` |
//! | VERVE_REDIS_URL | - | Redis URL for the `redis` bus |
//! | VERVE_EXPORT_TIMEOUT_MS | 5000 | Upper bound on one export |
//! | VERVE_NOTIFY_DEBOUNCE_MS | 100 | Delay before a callback fires |
//! | VERVE_NOTIFY_TIMEOUT_MS | 5000 | Callback HTTP timeout |
//! | VERVE_NOTIFY_WORKERS | cores | Concurrent callback deliveries |
//! | VERVE_LOG_JSON | false | JSON log output |

use crate::export::DEFAULT_TOPIC;
use crate::notify::{default_workers, DEFAULT_DEBOUNCE};
use crate::production::rollover_manager::DEFAULT_EXPORT_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "VERVE_CONFIG";

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io(std::io::Error),
    /// Config file or variable could not be parsed
    Parse(String),
    /// Configuration is well-formed but unusable
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Message bus backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Log,
    Memory,
    Redis,
}

impl FromStr for BusKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(BusKind::Log),
            "memory" => Ok(BusKind::Memory),
            "redis" => Ok(BusKind::Redis),
            other => Err(ConfigError::Parse(format!("unknown bus kind '{}'", other))),
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listen address
    pub listen_addr: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    pub export: ExportConfig,
    pub notify: NotifyConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_json: false,
            export: ExportConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

/// Rollover export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub topic: String,
    pub bus: BusKind,
    pub redis_url: Option<String>,
    /// Upper bound on one publish call (default: 5s)
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            topic: DEFAULT_TOPIC.to_string(),
            bus: BusKind::Log,
            redis_url: None,
            timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }
}

/// Callback notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Delay before a scheduled callback fires (default: 100ms)
    #[serde(with = "duration_millis")]
    pub debounce: Duration,
    /// HTTP request timeout (default: 5s)
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Concurrent deliveries (default: available parallelism)
    pub workers: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        NotifyConfig {
            debounce: DEFAULT_DEBOUNCE,
            timeout: Duration::from_secs(5),
            workers: default_workers(),
        }
    }
}

impl ServiceConfig {
    /// Load from `VERVE_CONFIG` (if set) and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => ServiceConfig::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `VERVE_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("VERVE_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(topic) = lookup("VERVE_TOPIC") {
            self.export.topic = topic;
        }
        if let Some(bus) = lookup("VERVE_BUS") {
            self.export.bus = bus.parse()?;
        }
        if let Some(url) = lookup("VERVE_REDIS_URL") {
            self.export.redis_url = Some(url);
        }
        if let Some(ms) = lookup("VERVE_EXPORT_TIMEOUT_MS") {
            self.export.timeout = parse_millis("VERVE_EXPORT_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("VERVE_NOTIFY_DEBOUNCE_MS") {
            self.notify.debounce = parse_millis("VERVE_NOTIFY_DEBOUNCE_MS", &ms)?;
        }
        if let Some(ms) = lookup("VERVE_NOTIFY_TIMEOUT_MS") {
            self.notify.timeout = parse_millis("VERVE_NOTIFY_TIMEOUT_MS", &ms)?;
        }
        if let Some(n) = lookup("VERVE_NOTIFY_WORKERS") {
            self.notify.workers = parse_number("VERVE_NOTIFY_WORKERS", &n)?;
        }
        if let Some(v) = lookup("VERVE_LOG_JSON") {
            self.log_json = v == "true" || v == "1";
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Invalid("listen_addr cannot be empty".to_string()));
        }
        if self.export.topic.is_empty() {
            return Err(ConfigError::Invalid("export topic cannot be empty".to_string()));
        }
        if self.export.bus == BusKind::Redis && self.export.redis_url.is_none() {
            return Err(ConfigError::Invalid(
                "redis bus requires VERVE_REDIS_URL".to_string(),
            ));
        }
        if self.export.timeout.is_zero() {
            return Err(ConfigError::Invalid("export timeout must be positive".to_string()));
        }
        if self.notify.debounce.is_zero() {
            return Err(ConfigError::Invalid("notify debounce must be positive".to_string()));
        }
        if self.notify.timeout.is_zero() {
            return Err(ConfigError::Invalid("notify timeout must be positive".to_string()));
        }
        if self.notify.workers == 0 {
            return Err(ConfigError::Invalid("notify workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Parse(format!("{} must be a number, got '{}'", name, value)))
}

fn parse_millis(name: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_number(name, value).map(Duration::from_millis)
}

/// Serde helper for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
