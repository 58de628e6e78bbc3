//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `FILAMENT_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{LogLevel, RelaySettings};

/// Resolve the default settings file path (`~/.filament/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".filament").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults. A file with invalid JSON, or JSON
/// that does not fit the settings shape, is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary key lookup.
///
/// Empty values are treated as unset. Values that fail to parse or fall
/// outside their range are ignored with a warning.
pub fn apply_overrides<F>(settings: &mut RelaySettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("FILAMENT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("FILAMENT_PORT") {
        match parse_u64_range(&v, 1, u64::from(u16::MAX)).and_then(|n| u16::try_from(n).ok()) {
            Some(port) => settings.server.port = port,
            None => warn_invalid("FILAMENT_PORT", &v),
        }
    }
    if let Some(v) = read("FILAMENT_ALLOWED_ORIGINS") {
        let origins = parse_list(&v);
        if origins.is_empty() {
            warn_invalid("FILAMENT_ALLOWED_ORIGINS", &v);
        } else {
            settings.server.allowed_origins = origins;
        }
    }
    if let Some(v) = read("FILAMENT_IDLE_TIMEOUT_SECS") {
        match parse_u64_range(&v, 0, 86_400) {
            Some(secs) => settings.server.idle_timeout_secs = secs,
            None => warn_invalid("FILAMENT_IDLE_TIMEOUT_SECS", &v),
        }
    }
    if let Some(v) = read("FILAMENT_MAX_MESSAGE_SIZE") {
        match parse_usize_range(&v, 1024, 1_073_741_824) {
            Some(size) => settings.server.max_message_size = size,
            None => warn_invalid("FILAMENT_MAX_MESSAGE_SIZE", &v),
        }
    }
    if let Some(v) = read("FILAMENT_SEND_QUEUE") {
        match parse_usize_range(&v, 1, 1_000_000) {
            Some(cap) => settings.server.send_queue_capacity = cap,
            None => warn_invalid("FILAMENT_SEND_QUEUE", &v),
        }
    }
    if let Some(v) = read("FILAMENT_METRICS") {
        match parse_bool(&v) {
            Some(enabled) => settings.server.metrics_enabled = enabled,
            None => warn_invalid("FILAMENT_METRICS", &v),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("FILAMENT_LOG_LEVEL") {
        match LogLevel::parse(&v) {
            Some(level) => settings.logging.level = level,
            None => warn_invalid("FILAMENT_LOG_LEVEL", &v),
        }
    }
    if let Some(v) = read("FILAMENT_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn_invalid("FILAMENT_LOG_JSON", &v),
        }
    }
}

fn warn_invalid(key: &str, value: &str) {
    warn!(key, value, "invalid settings env var, ignoring");
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated list, dropping blank entries.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
