//! Dashboard client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the dashboard's connection to the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Device host, optionally with a port (e.g. "192.168.1.40" or "localhost:8080")
    pub host: String,
    /// Use `wss://` instead of `ws://`
    pub secure: bool,
    /// WebSocket endpoint path on the device
    pub path: String,
    /// How long a new channel may take to become ready
    pub connect_timeout_ms: u64,
    /// Pause between a disconnect and the next connection attempt
    pub reconnect_delay_ms: u64,
    /// Initial category filter ("all", "power", "system", "digital", "input")
    pub filter: String,
    /// Initial search text
    pub search: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: format!("localhost:{}", crate::DEFAULT_DEVICE_PORT),
            secure: false,
            path: crate::DEFAULT_WS_PATH.to_string(),
            connect_timeout_ms: crate::DEFAULT_CONNECT_TIMEOUT_MS,
            reconnect_delay_ms: crate::DEFAULT_RECONNECT_DELAY_MS,
            filter: "all".to_string(),
            search: String::new(),
        }
    }
}

impl ClientConfig {
    /// Create a client configuration for a device host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Set the device host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Use a secure (`wss://`) channel.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the endpoint path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the connect timeout in milliseconds.
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set the reconnect delay in milliseconds.
    pub fn with_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.reconnect_delay_ms = ms;
        self
    }

    /// Set the initial category filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set the initial search text.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Get the full WebSocket URL of the device endpoint.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = self.path.trim_start_matches('/');
        format!("{}://{}/{}", scheme, self.host, path)
    }
}
