//! Simulated device configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the simulated device server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Whether to enable CORS
    pub enable_cors: bool,
    /// Period of the unsolicited snapshot broadcast
    pub broadcast_interval_ms: u64,
    /// Board name reported in snapshots
    pub target: String,
    /// GPIOs reported as not controllable
    pub reserved_gpios: Vec<u32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_DEVICE_PORT,
            enable_cors: true,
            broadcast_interval_ms: crate::DEFAULT_BROADCAST_INTERVAL_MS,
            target: "esp32s3".to_string(),
            // USB D-/D+ on the reference board
            reserved_gpios: vec![19, 20],
        }
    }
}

impl DeviceConfig {
    /// Create a device configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub fn with_broadcast_interval_ms(mut self, interval_ms: u64) -> Self {
        self.broadcast_interval_ms = interval_ms;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_reserved_gpios(mut self, gpios: Vec<u32>) -> Self {
        self.reserved_gpios = gpios;
        self
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.broadcast_interval(), Duration::from_millis(700));
        assert_eq!(config.reserved_gpios, vec![19, 20]);
    }

    #[test]
    fn test_builder() {
        let config = DeviceConfig::new("127.0.0.1", 0)
            .with_cors(false)
            .with_target("bench")
            .with_reserved_gpios(Vec::new());
        assert_eq!(config.bind_address(), "127.0.0.1:0");
        assert!(!config.enable_cors);
        assert_eq!(config.target, "bench");
        assert!(config.reserved_gpios.is_empty());
    }
}
