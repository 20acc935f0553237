//! # relay-settings
//!
//! Bootstrap configuration for the board relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.board-relay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `RELAY_*` overrides (highest priority)
//!
//! Only the binary reads settings. The relay engine takes plain config
//! values and never touches the environment itself.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = RelaySettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_values() {
        let settings = RelaySettings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(settings.logging.level, LogLevel::Info);
    }
}
