//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `RELAY_*` environment overrides (highest priority)
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

/// Smallest accepted `RELAY_MAX_MESSAGE_SIZE`.
const MIN_MESSAGE_SIZE: usize = 1024;
/// Largest accepted `RELAY_MAX_MESSAGE_SIZE`.
const MAX_MESSAGE_SIZE: usize = 256 << 20;

/// Resolve the settings file path (`~/.board-relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".board-relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = load_file_layer(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<RelaySettings> {
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

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RELAY_*` overrides read through `lookup`.
///
/// Empty values are ignored; invalid values are logged and ignored.
pub fn apply_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("RELAY_PORT") {
        match parse_u16_range(&v, 1, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "RELAY_PORT", value = %v, "invalid port, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_MAX_MESSAGE_SIZE") {
        match parse_usize_range(&v, MIN_MESSAGE_SIZE, MAX_MESSAGE_SIZE) {
            Some(size) => settings.server.max_message_size = size,
            None => warn!(key = "RELAY_MAX_MESSAGE_SIZE", value = %v, "invalid size, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_LOG_LEVEL") {
        match LogLevel::parse(&v) {
            Some(level) => settings.logging.level = level,
            None => warn!(key = "RELAY_LOG_LEVEL", value = %v, "invalid log level, ignoring"),
        }
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
