//! Server configuration.

use std::time::Duration;

use filament_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for [`RelayServer`](crate::server::RelayServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// CORS allow-list. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Idle timeout in seconds. `0` disables it.
    pub idle_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
}

impl ServerConfig {
    /// Idle timeout, if enabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            allowed_origins: vec!["*".into()],
            idle_timeout_secs: 0,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            send_queue_capacity: 1024,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            allowed_origins: settings.allowed_origins.clone(),
            idle_timeout_secs: settings.idle_timeout_secs,
            max_message_size: settings.max_message_size,
            send_queue_capacity: settings.send_queue_capacity.max(1),
        }
    }
}
