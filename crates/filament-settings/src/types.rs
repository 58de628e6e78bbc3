//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file may be partial: missing fields keep their default value.

use serde::{Deserialize, Serialize};

/// Root settings type for the relay.
///
/// ```json
/// {
///   "server": { "port": 9000, "allowedOrigins": ["https://app.example"] },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener, CORS, and connection settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Listener and connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// Origins allowed by CORS. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Close connections idle for this many seconds. `0` disables the timeout.
    pub idle_timeout_secs: u64,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before fan-out drops frames.
    pub send_queue_capacity: usize,
    /// Whether to install the Prometheus recorder and serve `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            allowed_origins: vec!["*".to_string()],
            idle_timeout_secs: 0,
            max_message_size: 16 * 1024 * 1024,
            send_queue_capacity: 1024,
            metrics_enabled: true,
        }
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parse a level name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.max_message_size, 16 * 1024 * 1024);
        assert_eq!(s.send_queue_capacity, 1024);
    }

    #[test]
    fn camel_case_wire_names() {
        let json = serde_json::to_value(ServerSettings::default()).unwrap();
        assert!(json.get("allowedOrigins").is_some());
        assert!(json.get("idleTimeoutSecs").is_some());
        assert!(json.get("sendQueueCapacity").is_some());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: RelaySettings = serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.logging.level, LogLevel::Info);
    }

    #[test]
    fn log_level_lowercase_serde() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
        let back: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(back, LogLevel::Debug);
    }

    #[test]
    fn log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("Trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
