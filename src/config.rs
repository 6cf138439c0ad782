use serde::Deserialize;
use std::path::Path;

use crate::output::OutputFormat;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub telemetry: TelemetryConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// The camera's control endpoint. Connecting to it is the registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub address: String,
    pub control_port: u16,
}

/// Local datagram endpoint the camera streams IMU samples to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub bind_address: String,
    pub port: u16,
    /// Receive buffer in bytes; longer datagrams are truncated by the OS.
    /// The whole buffer holds payload, no byte is reserved for a terminator.
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }
}

impl CameraConfig {
    /// `host:port` of the control channel
    pub fn control_endpoint(&self) -> String {
        format!("{}:{}", self.address, self.control_port)
    }
}

impl TelemetryConfig {
    pub fn bind_endpoint(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.254".to_string(),
            control_port: 3333,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5555,
            buffer_size: 2048,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
