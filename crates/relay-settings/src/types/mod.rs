//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every struct is `#[serde(default)]`,
//! so a settings file may specify any subset of keys.

mod server;

pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings.
///
/// ```json
/// { "server": { "port": 9000 }, "logging": { "level": "debug" } }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}
