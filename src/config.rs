//! Configuration for the KampanIO daemon
//!
//! Loads configuration from a TOML file; compiled-in defaults match the
//! stock ESP32 vibration sensor (WiFi AP at 192.168.4.1, port 12345,
//! text records).

use crate::error::Result;
use crate::protocol::{RecordFormat, TextSchema, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub records: RecordConfig,
    pub calibration: CalibrationConfig,
    pub logging: LoggingConfig,
}

/// Transport flavor for the telemetry link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// Datagram link with discovery handshake and keep-alive
    #[default]
    Udp,
    /// Reliable stream link carrying fixed-size binary records
    Tcp,
}

/// Telemetry link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Transport flavor
    pub transport: Transport,
    /// Local bind address for the datagram socket
    pub bind_address: String,
    /// Device address (discovery target / stream peer)
    pub peer_address: String,
    /// Discovery attempts before reporting failure
    pub discovery_retries: u32,
    /// Per-attempt wait for the discovery acknowledgment (ms)
    pub discovery_timeout_ms: u64,
    /// Keep-alive token resend interval (ms)
    pub keep_alive_interval_ms: u64,
    /// Inbound silence tolerated before the link counts as stale (ms)
    pub liveness_window_ms: u64,
    /// Records per read buffer on the stream transport
    pub stream_batch_records: usize,
}

impl LinkConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.liveness_window_ms)
    }
}

/// Record framing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordConfig {
    /// Encoding carried by the link
    pub format: RecordFormat,
    /// Accepted text field layouts (ignored for binary formats)
    pub text_schema: TextSchema,
}

/// Calibration run parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalibrationConfig {
    /// Samples per calibration run
    pub sample_count: usize,
    /// Exponential low-pass coefficient applied before statistics
    pub low_pass_alpha: f32,
    /// Maximum per-channel variance for a run to be accepted (raw units²)
    pub variance_threshold: f32,
    /// Also estimate accelerometer offsets when the schema carries accel
    pub calibrate_accel: bool,
    /// Wait for one sample before giving up on the run (ms)
    pub sample_timeout_ms: u64,
}

impl CalibrationConfig {
    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Default configuration for the stock ESP32 vibration sensor.
    ///
    /// The sensor runs a WiFi access point at 192.168.4.1 and streams
    /// newline-terminated CSV batches on port 12345.
    pub fn esp32_defaults() -> Self {
        Self {
            link: LinkConfig {
                transport: Transport::Udp,
                bind_address: format!("0.0.0.0:{DEFAULT_PORT}"),
                peer_address: format!("192.168.4.1:{DEFAULT_PORT}"),
                discovery_retries: 5,
                discovery_timeout_ms: 2000,
                keep_alive_interval_ms: 3000,
                liveness_window_ms: 3000,
                stream_batch_records: 1,
            },
            records: RecordConfig {
                format: RecordFormat::Text,
                text_schema: TextSchema::Auto,
            },
            calibration: CalibrationConfig {
                sample_count: 200,
                low_pass_alpha: 0.8,
                variance_threshold: 100.0,
                calibrate_accel: true,
                sample_timeout_ms: 5000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::esp32_defaults()
    }
}
