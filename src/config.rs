//! Configuration loading from TOML
//!
//! # Configuration File Format
//!
//! The configuration file is TOML-formatted with the following structure:
//!
//! ```toml
//! log_level = "info"
//!
//! [control]
//! port = "COM4"
//! baud_rate = 115200
//!
//! [data]
//! port = "COM3"
//! baud_rate = 921600
//!
//! [output]
//! path = "data.json"
//! ```
//!
//! Every section is optional; defaults match the radar's factory wiring
//! (CLI port at 115200 baud, telemetry port at 921600 baud). Omitting
//! `output.path` streams decoded records to stdout instead of a file.

use crate::error::{Error, Result};
use log::LevelFilter;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One serial endpoint: device path plus line speed.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Serial port name (e.g. "COM3", "/dev/ttyUSB0")
    pub port: String,

    /// Baud rate. The radar's CLI port runs at 115200, the telemetry
    /// port at 921600.
    pub baud_rate: u32,
}

/// Frame record persistence target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Output file path. `None` streams records to stdout.
    #[serde(default)]
    pub path: Option<String>,
}

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log severity filter: trace|debug|info|warn|error|off
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Radar CLI (configuration) port
    #[serde(default = "default_control")]
    pub control: EndpointConfig,

    /// Radar telemetry (data) port
    #[serde(default = "default_data")]
    pub data: EndpointConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_control() -> EndpointConfig {
    EndpointConfig {
        port: "COM4".to_string(),
        baud_rate: 115_200,
    }
}

fn default_data() -> EndpointConfig {
    EndpointConfig {
        port: "COM3".to_string(),
        baud_rate: 921_600,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            control: default_control(),
            data: default_data(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Validation
    ///
    /// - Port names must be non-empty.
    /// - Baud rates must be non-zero.
    /// - `log_level` must name a valid severity.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = basic_toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (label, endpoint) in [("control", &self.control), ("data", &self.data)] {
            if endpoint.port.is_empty() {
                return Err(Error::Config(format!(
                    "{} port name must not be empty",
                    label
                )));
            }
            if endpoint.baud_rate == 0 {
                return Err(Error::Config(format!(
                    "{} baud rate must be non-zero",
                    label
                )));
            }
        }
        self.level_filter()?;
        Ok(())
    }

    /// Parse `log_level` into a `log` filter.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => Ok(LevelFilter::Trace),
            "debug" => Ok(LevelFilter::Debug),
            "info" => Ok(LevelFilter::Info),
            "warn" | "warning" => Ok(LevelFilter::Warn),
            "error" => Ok(LevelFilter::Error),
            "off" => Ok(LevelFilter::Off),
            other => Err(Error::Config(format!("Unknown log level: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.control.port, "COM4");
        assert_eq!(config.control.baud_rate, 115_200);
        assert_eq!(config.data.port, "COM3");
        assert_eq!(config.data.baud_rate, 921_600);
        assert!(config.output.path.is_none());
        assert!(matches!(config.level_filter(), Ok(LevelFilter::Info)));
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
            log_level = "debug"

            [control]
            port = "/dev/ttyUSB1"
            baud_rate = 115200

            [data]
            port = "/dev/ttyUSB0"
            baud_rate = 921600

            [output]
            path = "radar.json"
        "#;

        let config: Config = basic_toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.data.port, "/dev/ttyUSB0");
        assert_eq!(config.output.path.as_deref(), Some("radar.json"));
        assert!(matches!(config.level_filter(), Ok(LevelFilter::Debug)));
    }

    #[test]
    fn test_rejects_zero_baud() {
        let toml = r#"
            [data]
            port = "COM3"
            baud_rate = 0
        "#;

        let config: Config = basic_toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_level() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
