//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (STRIDE_*)
//! - TOML configuration file

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use stride_core::FallConfig;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Stream configuration.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Fall detection configuration.
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Sample history configuration.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Path for the WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Hub broadcast capacity.
    #[serde(default = "default_hub_capacity")]
    pub capacity: usize,

    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Fall detection configuration.
///
/// Selects one of the deployed threshold presets by name; explicit fields
/// override individual preset values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Threshold preset: "strict" or "sensitive".
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Override: freefall threshold in m/s².
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freefall_threshold: Option<f64>,

    /// Override: impact threshold in m/s².
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_threshold: Option<f64>,

    /// Override: freefall-to-impact window in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<f64>,
}

impl DetectionConfig {
    /// Resolve the preset and overrides into detector thresholds.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown preset name or non-positive values.
    pub fn fall_config(&self) -> Result<FallConfig> {
        let mut config = match self.preset.as_str() {
            "strict" => FallConfig::strict(),
            "sensitive" => FallConfig::sensitive(),
            other => bail!("unknown detection preset '{other}' (expected \"strict\" or \"sensitive\")"),
        };

        if let Some(freefall) = self.freefall_threshold {
            config.freefall_threshold = freefall;
        }
        if let Some(impact) = self.impact_threshold {
            config.impact_threshold = impact;
        }
        if let Some(window) = self.window_ms {
            config.window_ms = window;
        }

        if config.freefall_threshold <= 0.0
            || config.impact_threshold <= 0.0
            || config.window_ms <= 0.0
        {
            bail!("detection thresholds must be positive");
        }
        if config.freefall_threshold >= config.impact_threshold {
            bail!("freefall threshold must be below the impact threshold");
        }

        Ok(config)
    }
}

/// Sample history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Path of the append-only sample log.
    #[serde(default = "default_history_path")]
    pub path: String,

    /// Bound on the in-memory window fed to the cadence estimator.
    #[serde(default = "default_history_window")]
    pub max_window: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Heartbeat interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("STRIDE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("STRIDE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/stream".to_string()
}

fn default_hub_capacity() -> usize {
    1024
}

fn default_max_connections() -> usize {
    10_000
}

fn default_preset() -> String {
    std::env::var("STRIDE_DETECTION_PRESET").unwrap_or_else(|_| "strict".to_string())
}

fn default_history_path() -> String {
    std::env::var("STRIDE_HISTORY_PATH").unwrap_or_else(|_| "sensor_history.jsonl".to_string())
}

fn default_history_window() -> usize {
    100_000
}

fn default_heartbeat_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stream: StreamConfig::default(),
            detection: DetectionConfig::default(),
            history: HistoryConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
            capacity: default_hub_capacity(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            freefall_threshold: None,
            impact_threshold: None,
            window_ms: None,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            max_window: default_history_window(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "stridewatch.toml",
            "/etc/stridewatch/stridewatch.toml",
            "~/.config/stridewatch/stridewatch.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}
